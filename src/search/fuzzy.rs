//! Scoring of one query against one full name.
//!
//! The best in-order alignment is found by dynamic programming over
//! (query position, text position, length of the contiguous run ending there).
//! Per matched character:
//!
//! - position weight `max(100 / sqrt(pos + 1), 1)`, so early matches count more
//! - +20 when the character starts a scope segment
//! - +20 at a word boundary: next to `_`, at the end of a segment, or on a
//!   camel-case hump
//! - `r² × 10` when it extends a contiguous run, `r` counting the matches
//!   before it in that run
//!
//! Leaving a run of `r` contiguous matches for a gap costs `r × 10`; every
//! unmatched text character costs 1; matching the whole name exactly adds 1000.
//!
//! Memory is two score rows of `n × (m + 1)` plus one `m × n` backtrack table.

const MIN_POSITION_WEIGHT: i64 = 1;
const POSITION_WEIGHT: f64 = 100.0;
const SEGMENT_START_BONUS: i64 = 20;
const WORD_BOUNDARY_BONUS: i64 = 20;
const CONSECUTIVE_BONUS: i64 = 10;
const GAP_PENALTY: i64 = 10;
const UNMATCHED_PENALTY: i64 = 1;
const EXACT_MATCH_BONUS: i64 = 1000;

/// Best alignment of a query against a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyScore {
    pub score: i64,
    /// Char indices into the text, one per query char, ascending.
    pub indices: Vec<usize>,
}

struct Scorer<'a> {
    text: &'a [char],
    delimiter: &'a [char],
}

impl Scorer<'_> {
    fn is_delimiter(&self, c: char) -> bool {
        self.delimiter.contains(&c)
    }

    fn char_score(&self, j: usize) -> i64 {
        let text = self.text;
        let mut score = ((POSITION_WEIGHT / ((j + 1) as f64).sqrt()) as i64).max(MIN_POSITION_WEIGHT);

        if j == 0 || self.is_delimiter(text[j - 1]) {
            score += SEGMENT_START_BONUS;
        }

        let current = text[j];
        let previous = if j > 0 { Some(text[j - 1]) } else { None };
        let next = text.get(j + 1).copied();

        let boundary = previous == Some('_')
            || next.map_or(true, |n| n == '_' || self.is_delimiter(n))
            || (current.is_lowercase() && next.is_some_and(char::is_uppercase))
            || (current.is_uppercase() && previous.is_some_and(char::is_lowercase));
        if boundary {
            score += WORD_BOUNDARY_BONUS;
        }
        score
    }
}

fn is_subsequence(query: &[char], text: &[char]) -> bool {
    let mut remaining = query.iter().peekable();
    for c in text {
        if remaining.peek() == Some(&c) {
            remaining.next();
        }
    }
    remaining.peek().is_none()
}

fn lowercase(chars: &[char]) -> Vec<char> {
    chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect()
}

/// Scores `query` against `text`; `None` when the query is empty or not an
/// in-order, case-insensitive subsequence of the text.
pub fn score(query: &str, text: &str, delimiter: &str) -> Option<FuzzyScore> {
    let query: Vec<char> = query.chars().collect();
    let original: Vec<char> = text.chars().collect();
    let query = lowercase(&query);
    let lowered = lowercase(&original);

    let m = query.len();
    let n = lowered.len();
    if m == 0 || m > n || !is_subsequence(&query, &lowered) {
        return None;
    }

    let delimiter: Vec<char> = delimiter.chars().collect();
    let scorer = Scorer {
        text: &original,
        delimiter: &delimiter,
    };
    let char_scores: Vec<i64> = (0..n).map(|j| scorer.char_score(j)).collect();

    // Only rows i-1 and i are kept: row[j * runs + r] is the best score with
    // the current query char at text[j], ending a contiguous run of length r.
    let runs = m + 1;
    let cell = |j: usize, r: usize| j * runs + r;
    let mut previous: Vec<Option<i64>> = vec![None; n * runs];
    let mut current: Vec<Option<i64>> = vec![None; n * runs];
    // Predecessor (text index, run length) for cells entered after a gap.
    // Inside a run the predecessor is implied, so this is all backtracking needs.
    let mut gap_from: Vec<Option<(usize, usize)>> = vec![None; m * n];

    for i in 0..m {
        current.fill(None);
        // Best `previous[k][r] - r * GAP_PENALTY` over k <= j - 2, built incrementally.
        let mut best_before_gap: Option<(i64, usize, usize)> = None;

        for j in 0..n {
            if i > 0 && j >= 2 {
                let k = j - 2;
                for r in 1..=i {
                    if let Some(value) = previous[cell(k, r)] {
                        let candidate = value - GAP_PENALTY * r as i64;
                        if best_before_gap.map_or(true, |(best, _, _)| candidate > best) {
                            best_before_gap = Some((candidate, k, r));
                        }
                    }
                }
            }

            if lowered[j] != query[i] {
                continue;
            }

            if i == 0 {
                current[cell(j, 1)] = Some(char_scores[j]);
                continue;
            }

            if let Some((best, k, r)) = best_before_gap {
                current[cell(j, 1)] = Some(best + char_scores[j]);
                gap_from[i * n + j] = Some((k, r));
            }

            if j >= 1 {
                for r in 2..=(i + 1) {
                    if let Some(value) = previous[cell(j - 1, r - 1)] {
                        let preceding = (r - 1) as i64;
                        current[cell(j, r)] = Some(
                            value + char_scores[j] + preceding * preceding * CONSECUTIVE_BONUS,
                        );
                    }
                }
            }
        }

        std::mem::swap(&mut previous, &mut current);
    }

    // `previous` now holds the row of the last query char.
    let mut best: Option<(i64, usize, usize)> = None;
    for j in 0..n {
        for r in 1..=m {
            if let Some(value) = previous[cell(j, r)] {
                if best.map_or(true, |(b, _, _)| value > b) {
                    best = Some((value, j, r));
                }
            }
        }
    }
    let (mut total, last, run) = best?;

    let mut indices = vec![0; m];
    let (mut j, mut r) = (last, run);
    for i in (0..m).rev() {
        indices[i] = j;
        if i == 0 {
            break;
        }
        if r > 1 {
            j -= 1;
            r -= 1;
        } else {
            let (k, previous_run) = gap_from[i * n + j]?;
            j = k;
            r = previous_run;
        }
    }

    total -= UNMATCHED_PENALTY * (n - m) as i64;
    if n == m {
        total += EXACT_MATCH_BONUS;
    }

    Some(FuzzyScore {
        score: total,
        indices,
    })
}
