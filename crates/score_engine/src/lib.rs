//! Score Engine - čisté jádro rekonciliace live zápasů
//! Pravidlové systémy místo fuzzy magie: exact match jmen, normalizace skóre,
//! klasifikace stavu, určení vítěze. Žádné I/O, všechno jde testovat bez browseru.

use serde::Serialize;
use std::fmt;

/// Predikovaný zápas z tabulky `predictions` (engine ji nikdy nemění)
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedMatch {
    pub match_id: String,
    pub player1: String,          // slot home
    pub player2: String,          // slot away
    pub tournament: String,
}

/// Jeden řádek zápasu tak, jak ho vyrendruje live listing.
/// Set tokeny se sbírají pro každou stranu zvlášť - u rozbitého řádku se délky
/// můžou lišit, validuje se až v compute_live_state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveFragment {
    pub home_name: String,
    pub away_name: String,
    pub set_home: Vec<String>,    // raw tokeny, tiebreak slepený ("76", "6(3)")
    pub set_away: Vec<String>,
    pub sets_won_home: String,    // souhrnná buňka vyhraných setů, "" když chybí
    pub sets_won_away: String,
    pub status_text: String,      // text stage buňky ("Finished", "Set 2", ...)
    pub emphasis_home: bool,      // jméno zvýrazněné (vede / vyhrál)
    pub emphasis_away: bool,
}

/// Stav zápasu pro sloupec `live_matches.live_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    NotStarted,
    Live,
    Completed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::NotStarted => "not_started",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
        }
    }
}

/// Nový stav jednoho zápasu - to, co se upsertne do `live_matches`.
/// `last_updated` razítkuje až DB vrstva, tady žádné hodiny nejsou.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMatchState {
    pub match_id: String,
    pub live_score: String,       // "" = skóre zatím není
    pub status: MatchStatus,
    pub winner: Option<String>,   // None = nerozhodnuto, jinak player1/player2
}

/// Verdikt resolveru - slot, ne jméno. Na jméno se mapuje až přes predikci,
/// takže vítěz vždycky odpovídá player1 nebo player2 a ničemu jinému.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerCall {
    Player1,
    Player2,
    Undetermined,
}

impl WinnerCall {
    /// Vrátí jméno vítěze podle predikovaného páru
    pub fn name<'a>(&self, m: &'a PredictedMatch) -> Option<&'a str> {
        match self {
            WinnerCall::Player1 => Some(&m.player1),
            WinnerCall::Player2 => Some(&m.player2),
            WinnerCall::Undetermined => None,
        }
    }
}

/// Rozbitý fragment - jediná tvrdá chyba čistého jádra
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    MismatchedSets { home: usize, away: usize },
}

impl fmt::Display for FragmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentError::MismatchedSets { home, away } => {
                write!(f, "set arrays mismatched: home={} away={}", home, away)
            }
        }
    }
}

impl std::error::Error for FragmentError {}

/// Jak dopadla rekonciliace jednoho zápasu
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Found,
    NotFound,
    Failed(FragmentError),
}

/// Výstup rekonciliace: stav k zápisu + co se s ním stalo.
/// I NotFound a Failed nesou zapisovatelný fallback stav.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub state: LiveMatchState,
    pub disposition: Disposition,
}

// ── Identity matching ──

/// Najde fragment pro predikovaný pár - exact match obou jmen ve správných
/// slotech. Žádný fuzzy matching: listing zkracuje jména ("Novak A.") a dva
/// různí hráči se stejnou zkratkou by se jinak dali zkřížit. Víc shod = první
/// v pořadí stránky.
pub fn find_fragment<'a>(
    m: &PredictedMatch,
    fragments: &'a [LiveFragment],
) -> Option<&'a LiveFragment> {
    fragments
        .iter()
        .find(|f| f.home_name == m.player1 && f.away_name == m.player2)
}

// ── Score normalizace ──

/// Ořízne tiebreakový token na číslici gamů. Listing lepí tiebreakové body
/// k číslu setu bez oddělovače ("76", "64"), takže token delší než 1 znak
/// začínající na 6/7 bereme jako první znak. Známá aproximace: token "10"
/// ze supertiebreaku projde beze změny.
fn trim_tiebreak(token: &str) -> &str {
    if token.len() > 1 && (token.starts_with('6') || token.starts_with('7')) {
        &token[..1]
    } else {
        token
    }
}

/// Poskládá kanonické skóre "6-4 7-6" z per-set tokenů. Páry, kde jsou obě
/// strany prázdné, vypadnou. Když per-set tokeny nejsou vůbec, spadne se na
/// souhrn vyhraných setů ("2-0"). Nikdy nevrací chybu, nejhorší výsledek je "".
pub fn normalize_score(
    set_home: &[String],
    set_away: &[String],
    sets_won_home: &str,
    sets_won_away: &str,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (a, b) in set_home.iter().zip(set_away.iter()) {
        let pair = format!("{}-{}", trim_tiebreak(a), trim_tiebreak(b));
        if pair != "-" {
            parts.push(pair);
        }
    }

    if !parts.is_empty() {
        return parts.join(" ");
    }

    // fallback jen když set pole úplně chybí, ne když jsou jen prázdné tokeny
    if set_home.is_empty()
        && set_away.is_empty()
        && !sets_won_home.is_empty()
        && !sets_won_away.is_empty()
    {
        return format!("{}-{}", sets_won_home, sets_won_away);
    }

    String::new()
}

// ── Status klasifikace ──

/// Klasifikace stavu z textu stage buňky + normalizovaného skóre.
/// Pořadí pravidel je podstatné: live indikátory přebíjejí přítomnost skóre
/// (dohraný zápas má číslice taky) a rozehraný set s hodinami nesmí spadnout
/// na not_started jen kvůli 0-0.
pub fn classify_status(status_text: &str, normalized_score: &str) -> MatchStatus {
    let s = status_text.to_lowercase();

    // 1. live indikátory: "live"/"set"/"game", nebo běžící hodiny s ':'
    //    (dvojtečka sama nestačí - "not started 14:30" ani odložený zápas ne)
    if s.contains("live")
        || s.contains("set")
        || s.contains("game")
        || (s.contains(':') && !s.contains("not started") && !s.contains("postponed"))
    {
        return MatchStatus::Live;
    }

    // 2. skóre existuje a nikdo netvrdí, že se nezačalo -> dohráno
    if !normalized_score.is_empty() && !s.contains("not started") {
        return MatchStatus::Completed;
    }

    MatchStatus::NotStarted
}

// ── Winner resolution ──

/// Číselný prefix tokenu ("7" -> 7, "6(3)" -> 6, "AD" -> None)
fn leading_number(token: &str) -> Option<u32> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Určení vítěze ve dvou vrstvách:
///   1. zvýraznění na stránce - pokrývá i skreče a walkovery, kde aritmetika
///      setů lže nebo chybí
///   2. aritmetika setů z per-set tokenů + souhrnných buněk
/// Když nerozhodne ani jedna vrstva, vítěz zůstává neurčený. Hádat se nesmí.
pub fn resolve_winner(f: &LiveFragment) -> WinnerCall {
    // Vrstva 1: přesně jedna strana zvýrazněná
    if f.emphasis_home != f.emphasis_away {
        return if f.emphasis_home {
            WinnerCall::Player1
        } else {
            WinnerCall::Player2
        };
    }

    // Vrstva 2: jen když máme obě souhrnné buňky
    if f.sets_won_home.is_empty() || f.sets_won_away.is_empty() {
        return WinnerCall::Undetermined;
    }

    let mut home_sets = 0u32;
    let mut away_sets = 0u32;
    for (a, b) in f.set_home.iter().zip(f.set_away.iter()) {
        match (
            leading_number(trim_tiebreak(a)),
            leading_number(trim_tiebreak(b)),
        ) {
            (Some(ga), Some(gb)) if ga > gb => home_sets += 1,
            (Some(ga), Some(gb)) if gb > ga => away_sets += 1,
            _ => {}
        }
    }

    // Souhrnná buňka zachytí i set, který v per-set tokenech ještě neleží
    if let (Some(sa), Some(sb)) = (
        leading_number(&f.sets_won_home),
        leading_number(&f.sets_won_away),
    ) {
        if sa > sb {
            home_sets += 1;
        } else if sb > sa {
            away_sets += 1;
        }
    }

    if home_sets > away_sets {
        WinnerCall::Player1
    } else if away_sets > home_sets {
        WinnerCall::Player2
    } else {
        WinnerCall::Undetermined
    }
}

// ── Rekonciliace ──

/// Fallback stav - zápas na stránce není nebo je jeho řádek rozbitý
pub fn fallback_state(m: &PredictedMatch) -> LiveMatchState {
    LiveMatchState {
        match_id: m.match_id.clone(),
        live_score: String::new(),
        status: MatchStatus::NotStarted,
        winner: None,
    }
}

/// Čistý výpočet nového stavu pro nalezený fragment:
/// validace tvaru -> normalizace skóre -> klasifikace -> vítěz
pub fn compute_live_state(
    m: &PredictedMatch,
    f: &LiveFragment,
) -> Result<LiveMatchState, FragmentError> {
    if f.set_home.len() != f.set_away.len() {
        return Err(FragmentError::MismatchedSets {
            home: f.set_home.len(),
            away: f.set_away.len(),
        });
    }

    let live_score = normalize_score(&f.set_home, &f.set_away, &f.sets_won_home, &f.sets_won_away);
    let status = classify_status(&f.status_text, &live_score);
    let winner = resolve_winner(f).name(m).map(str::to_string);

    Ok(LiveMatchState {
        match_id: m.match_id.clone(),
        live_score,
        status,
        winner,
    })
}

/// Rekonciliace jednoho zápasu. Nikdy nepanikaří - rozbitý fragment vrací
/// Failed s fallback stavem, aby šel pořád zapsat.
pub fn reconcile_match(m: &PredictedMatch, fragments: &[LiveFragment]) -> MatchOutcome {
    let fragment = match find_fragment(m, fragments) {
        Some(f) => f,
        None => {
            return MatchOutcome {
                state: fallback_state(m),
                disposition: Disposition::NotFound,
            }
        }
    };

    match compute_live_state(m, fragment) {
        Ok(state) => MatchOutcome {
            state,
            disposition: Disposition::Found,
        },
        Err(e) => MatchOutcome {
            state: fallback_state(m),
            disposition: Disposition::Failed(e),
        },
    }
}

/// Rekonciliace celé dávky - každý zápas nezávisle, chyba jednoho neshodí
/// ostatní. Výstup drží pořadí vstupních predikcí.
pub fn reconcile_all(predicted: &[PredictedMatch], fragments: &[LiveFragment]) -> Vec<MatchOutcome> {
    predicted
        .iter()
        .map(|m| reconcile_match(m, fragments))
        .collect()
}
