#![forbid(unsafe_code)]

//! Per-position match bonuses.

use crate::table::ScoreTable;

/// Codepoint used as the predecessor of the first candidate position.
///
/// Treating the start of the candidate as following a path separator gives
/// a leading match the strongest word-start bonus.
pub(crate) const START: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Other,
    Word,
    Upper,
}

fn class_of(ch: char) -> CharClass {
    if ch.is_uppercase() {
        CharClass::Upper
    } else if ch.is_alphanumeric() {
        CharClass::Word
    } else {
        CharClass::Other
    }
}

/// Bonus for matching `ch` when it directly follows `prev`.
pub(crate) fn bonus_for(table: &ScoreTable, prev: char, ch: char) -> f64 {
    let class = class_of(ch);
    if class == CharClass::Other {
        return 0.0;
    }
    match prev {
        '/' => table.match_slash,
        '-' | '_' | ' ' => table.match_word,
        '.' => table.match_dot,
        p if class == CharClass::Upper && p.is_lowercase() => table.match_capital,
        _ => 0.0,
    }
}

/// Fill `out` with the bonus of every position in `haystack`.
pub(crate) fn compute_bonus(table: &ScoreTable, haystack: &[char], out: &mut Vec<f64>) {
    out.clear();
    let mut prev = START;
    for &ch in haystack {
        out.push(bonus_for(table, prev, ch));
        prev = ch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: ScoreTable = ScoreTable::FZY_V1;

    #[test]
    fn start_of_candidate_gets_slash_bonus() {
        let mut out = Vec::new();
        compute_bonus(&T, &['a', 'b'], &mut out);
        assert_eq!(out, vec![T.match_slash, 0.0]);
    }

    #[test]
    fn word_separators() {
        assert_eq!(bonus_for(&T, '-', 'a'), T.match_word);
        assert_eq!(bonus_for(&T, '_', '7'), T.match_word);
        assert_eq!(bonus_for(&T, ' ', 'Q'), T.match_word);
        assert_eq!(bonus_for(&T, '.', 'c'), T.match_dot);
    }

    #[test]
    fn camel_case_boundary() {
        assert_eq!(bonus_for(&T, 'o', 'B'), T.match_capital);
        assert_eq!(bonus_for(&T, 'O', 'B'), 0.0);
        assert_eq!(bonus_for(&T, '1', 'B'), 0.0);
        assert_eq!(bonus_for(&T, 'o', 'b'), 0.0);
    }

    #[test]
    fn punctuation_never_scores_a_bonus() {
        assert_eq!(bonus_for(&T, '/', '.'), 0.0);
        assert_eq!(bonus_for(&T, '/', '/'), 0.0);
    }

    #[test]
    fn non_ascii_letters_are_word_chars() {
        assert_eq!(bonus_for(&T, '/', 'é'), T.match_slash);
        assert_eq!(bonus_for(&T, 'é', 'É'), T.match_capital);
    }
}
