//! Flashscore live-tennis scraper
//!
//! Listing je renderovaný JS-em, obyčejný GET vrátí prázdnou kostru bez řádků.
//! Proto se jede přes headless Chrome a parsuje se až vyrendrovaný DOM.
//!
//! Struktura jednoho řádku (tenis):
//! <div class="event__match">
//!   <div class="event__participant event__participant--home fontBold">Novak A.</div>
//!   <div class="event__participant event__participant--away">Smith B.</div>
//!   <div class="event__score event__score--home">2</div>
//!   <div class="event__part event__part--home event__part--1">7<sup>7</sup></div>
//!   <div class="event__stage">Finished</div>
//! </div>
//!
//! Pozor: text setové buňky slepí tiebreak s gamy ("77") - řeší až score_engine.

use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions};
use scraper::{CaseSensitivity, ElementRef, Html, Selector};
use score_engine::LiveFragment;
use std::time::Duration;
use tokio::task;
use tracing::{debug, warn};

/// Kolik setových buněk se na stránce může objevit (grand slam = best of five)
const MAX_SETS: usize = 5;

/// Pauza po wait_for_element, než se listing dohydratuje
const RENDER_SETTLE: Duration = Duration::from_secs(2);

/// Diagnóza jednoho fetche listingu (pro scrape-test)
#[derive(Debug, Clone)]
pub struct ListingProbe {
    pub url: String,
    pub html_len: usize,
    pub row_count: usize,
    pub fragment_count: usize,
    pub looks_like_challenge_page: bool,
}

/// Text elementu bez tagů, trim + sesypané vnitřní mezery.
/// U setové buňky "7<sup>7</sup>" tohle vrátí "77" - záměrně, normalizace
/// tiebreaku je práce enginu, ne extraktoru.
fn clean_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Zvýrazněné jméno = vede nebo vyhrál. Listing to dělá dvěma způsoby:
/// class "fontBold" přímo na participantovi, nebo <strong> uvnitř.
fn is_emphasized(el: &ElementRef, strong_sel: &Selector) -> bool {
    el.value()
        .has_class("fontBold", CaseSensitivity::CaseSensitive)
        || el.select(strong_sel).next().is_some()
}

/// Čistý parse vyrendrovaného HTML na fragmenty zápasů.
/// Oddělené od fetche, aby šel parser testovat bez browseru.
pub fn parse_listing(html: &str) -> Vec<LiveFragment> {
    let document = Html::parse_document(html);

    let row_sel = Selector::parse("div.event__match").unwrap();
    let home_sel = Selector::parse(".event__participant--home").unwrap();
    let away_sel = Selector::parse(".event__participant--away").unwrap();
    let score_home_sel = Selector::parse(".event__score--home").unwrap();
    let score_away_sel = Selector::parse(".event__score--away").unwrap();
    let stage_sel = Selector::parse(".event__stage").unwrap();
    let strong_sel = Selector::parse("strong").unwrap();

    let mut fragments = Vec::new();

    for row in document.select(&row_sel) {
        let home_el = match row.select(&home_sel).next() {
            Some(el) => el,
            None => {
                debug!("event row without home participant, skipping");
                continue;
            }
        };
        let away_el = match row.select(&away_sel).next() {
            Some(el) => el,
            None => {
                debug!("event row without away participant, skipping");
                continue;
            }
        };

        let home_name = clean_text(&home_el);
        let away_name = clean_text(&away_el);
        if home_name.is_empty() || away_name.is_empty() {
            debug!("event row with blank participant name, skipping");
            continue;
        }

        // Setové buňky: existující buňka se bere i prázdná (pár "-" vyhodí
        // až normalizace), chybějící buňka se přeskočí. Když tím vzniknou
        // různě dlouhá pole, je řádek rozbitý a řeší to engine.
        let mut set_home = Vec::new();
        let mut set_away = Vec::new();
        for i in 1..=MAX_SETS {
            let part_home = Selector::parse(&format!(".event__part--home.event__part--{i}")).unwrap();
            if let Some(el) = row.select(&part_home).next() {
                set_home.push(clean_text(&el));
            }
            let part_away = Selector::parse(&format!(".event__part--away.event__part--{i}")).unwrap();
            if let Some(el) = row.select(&part_away).next() {
                set_away.push(clean_text(&el));
            }
        }

        let sets_won_home = row
            .select(&score_home_sel)
            .next()
            .map(|el| clean_text(&el))
            .unwrap_or_default();
        let sets_won_away = row
            .select(&score_away_sel)
            .next()
            .map(|el| clean_text(&el))
            .unwrap_or_default();

        // Status jen ze stage buňky. event__time (plánovaný začátek "14:30")
        // se sem nesmí dostat, dvojtečka by z nerozehraného zápasu udělala live.
        let status_text = row
            .select(&stage_sel)
            .next()
            .map(|el| clean_text(&el))
            .unwrap_or_default();

        let emphasis_home = is_emphasized(&home_el, &strong_sel);
        let emphasis_away = is_emphasized(&away_el, &strong_sel);

        fragments.push(LiveFragment {
            home_name,
            away_name,
            set_home,
            set_away,
            sets_won_home,
            sets_won_away,
            status_text,
            emphasis_home,
            emphasis_away,
        });
    }

    fragments
}

/// Stáhne vyrendrovaný listing přes headless Chrome.
/// headless_chrome je sync API, proto spawn_blocking.
pub async fn fetch_rendered_html(url: &str) -> Result<String> {
    let url = url.to_string();

    let html = task::spawn_blocking(move || -> Result<String> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .build()
            .context("Failed to build Chrome launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome")?;
        let tab = browser.new_tab().context("Failed to create browser tab")?;

        tab.navigate_to(&url).context("Chrome navigate failed")?;

        // Řádky hydratuje JS až po loadu - čekej na první, jinak aspoň na body
        // (den bez zápasů nesmí být chyba)
        if tab.wait_for_element("div.event__match").is_err() {
            tab.wait_for_element("body")
                .context("Chrome wait_for_element(body) failed")?;
        }
        std::thread::sleep(RENDER_SETTLE);

        tab.get_content().context("Failed to read HTML from browser tab")
    })
    .await??;

    Ok(html)
}

/// Hlavní vstup: jeden render stránky -> fragmenty všech zápasů na ní.
/// Jeden fetch na celý pass, per-match se už nikam nechodí.
pub async fn fetch_live_fragments(url: &str) -> Result<Vec<LiveFragment>> {
    let html = fetch_rendered_html(url).await?;
    let fragments = parse_listing(&html);

    if fragments.is_empty() {
        warn!("Flashscore listing has no parseable match rows ({} bytes html)", html.len());
    } else {
        debug!("Flashscore listing: {} fragments", fragments.len());
    }

    Ok(fragments)
}

/// Diagnostický fetch: kolik HTML přišlo, kolik řádků, kolik se dalo
/// vytáhnout a jestli to nevypadá na anti-bot stránku.
pub async fn probe_listing(url: &str) -> Result<ListingProbe> {
    let html = fetch_rendered_html(url).await?;

    let document = Html::parse_document(&html);
    let row_sel = Selector::parse("div.event__match").unwrap();
    let row_count = document.select(&row_sel).count();
    let fragment_count = parse_listing(&html).len();

    let lower = html.to_lowercase();
    let looks_like_challenge_page = lower.contains("just a moment")
        || lower.contains("cf-challenge")
        || lower.contains("captcha")
        || lower.contains("cloudflare");

    Ok(ListingProbe {
        url: url.to_string(),
        html_len: html.len(),
        row_count,
        fragment_count,
        looks_like_challenge_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_finished_row_with_tiebreak_and_bold() {
        let html = r#"
        <div class="sportName tennis">
          <div class="event__match event__match--twoLine">
            <div class="event__participant event__participant--home fontBold">Svobodova K.</div>
            <div class="event__participant event__participant--away">Rossi M.</div>
            <div class="event__score event__score--home">2</div>
            <div class="event__score event__score--away">0</div>
            <div class="event__part event__part--home event__part--1">6</div>
            <div class="event__part event__part--away event__part--1">4</div>
            <div class="event__part event__part--home event__part--2">7<sup>7</sup></div>
            <div class="event__part event__part--away event__part--2">6<sup>3</sup></div>
            <div class="event__stage">Finished</div>
          </div>
        </div>"#;

        let fragments = parse_listing(html);
        assert_eq!(fragments.len(), 1);

        let f = &fragments[0];
        assert_eq!(f.home_name, "Svobodova K.");
        assert_eq!(f.away_name, "Rossi M.");
        assert_eq!(f.set_home, vec!["6", "77"]);
        assert_eq!(f.set_away, vec!["4", "63"]);
        assert_eq!(f.sets_won_home, "2");
        assert_eq!(f.sets_won_away, "0");
        assert_eq!(f.status_text, "Finished");
        assert!(f.emphasis_home);
        assert!(!f.emphasis_away);
    }

    #[test]
    fn parses_live_row_with_strong_emphasis_and_stage_clock() {
        let html = r#"
        <div class="event__match">
          <div class="event__participant event__participant--home"><strong>Novak A.</strong></div>
          <div class="event__participant event__participant--away">Smith B.</div>
          <div class="event__score event__score--home">1</div>
          <div class="event__score event__score--away">0</div>
          <div class="event__part event__part--home event__part--1">6</div>
          <div class="event__part event__part--away event__part--1">4</div>
          <div class="event__part event__part--home event__part--2">2</div>
          <div class="event__part event__part--away event__part--2">3</div>
          <div class="event__stage">Set 2<span> - </span>0:15</div>
        </div>"#;

        let fragments = parse_listing(html);
        assert_eq!(fragments.len(), 1);

        let f = &fragments[0];
        assert_eq!(f.home_name, "Novak A.");
        assert_eq!(f.status_text, "Set 2 - 0:15");
        assert!(f.emphasis_home);
        assert!(!f.emphasis_away);
        assert_eq!(f.set_home, vec!["6", "2"]);
        assert_eq!(f.set_away, vec!["4", "3"]);
    }

    #[test]
    fn scheduled_row_has_empty_status_and_no_sets() {
        // plánovaný zápas: jen čas začátku v event__time, žádná stage buňka
        let html = r#"
        <div class="event__match">
          <div class="event__time">14:30</div>
          <div class="event__participant event__participant--home">Garcia L.</div>
          <div class="event__participant event__participant--away">Dvorak P.</div>
        </div>"#;

        let fragments = parse_listing(html);
        assert_eq!(fragments.len(), 1);

        let f = &fragments[0];
        assert_eq!(f.status_text, "");
        assert!(f.set_home.is_empty());
        assert!(f.set_away.is_empty());
        assert_eq!(f.sets_won_home, "");
        assert_eq!(f.sets_won_away, "");
        assert!(!f.emphasis_home);
        assert!(!f.emphasis_away);
    }

    #[test]
    fn rows_without_both_participants_are_skipped() {
        let html = r#"
        <div class="event__match">
          <div class="event__participant event__participant--home">Sám Samotný</div>
        </div>
        <div class="event__match">
          <div class="event__participant event__participant--home">Garcia L.</div>
          <div class="event__participant event__participant--away">Dvorak P.</div>
        </div>"#;

        let fragments = parse_listing(html);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].home_name, "Garcia L.");
    }

    #[test]
    fn participant_text_is_trimmed_and_collapsed() {
        let html = r#"
        <div class="event__match">
          <div class="event__participant event__participant--home">
            Novak
            A.
          </div>
          <div class="event__participant event__participant--away"> Smith B. </div>
        </div>"#;

        let fragments = parse_listing(html);
        assert_eq!(fragments[0].home_name, "Novak A.");
        assert_eq!(fragments[0].away_name, "Smith B.");
    }

    #[test]
    fn page_order_is_preserved() {
        let html = r#"
        <div class="event__match">
          <div class="event__participant event__participant--home">First H.</div>
          <div class="event__participant event__participant--away">First A.</div>
        </div>
        <div class="event__match">
          <div class="event__participant event__participant--home">Second H.</div>
          <div class="event__participant event__participant--away">Second A.</div>
        </div>"#;

        let fragments = parse_listing(html);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].home_name, "First H.");
        assert_eq!(fragments[1].home_name, "Second H.");
    }
}
