//! Rhyme (qafiyeh) and radif predicates over the verses of one poem.
//!
//! The radif of a poem is read from its opening couplet: the longest run of
//! trailing words both mesras share, always leaving at least one word in
//! front of it for the rhyme. The rhyme word is the word right before the
//! radif. Ordinal 0 is the title row and never rhymes.

use crate::models::Verse;

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .collect()
}

fn ends_with_words(line: &[&str], tail: &[&str]) -> bool {
    line.len() >= tail.len() && line[line.len() - tail.len()..] == *tail
}

fn opening_couplet(verses: &[Verse]) -> Option<(Vec<&str>, Vec<&str>)> {
    let mut mesras = verses.iter().filter(|v| v.order > 0);
    let first = words(&mesras.next()?.text);
    let second = words(&mesras.next()?.text);
    Some((first, second))
}

/// Trailing words shared by the opening couplet.
pub fn poem_radif(verses: &[Verse]) -> Vec<&str> {
    let Some((first, second)) = opening_couplet(verses) else {
        return Vec::new();
    };

    let shared = first
        .iter()
        .rev()
        .zip(second.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let shared = shared.min(first.len().min(second.len()).saturating_sub(1));
    first[first.len() - shared..].to_vec()
}

/// Word carrying the rhyme in `line` once `radif` is removed from its end.
fn rhyme_word<'a>(line: &[&'a str], radif: &[&str]) -> Option<&'a str> {
    if !ends_with_words(line, radif) {
        return None;
    }
    line[..line.len() - radif.len()].last().copied()
}

fn verse_at(verses: &[Verse], order: i64) -> Option<&Verse> {
    if order <= 0 {
        return None;
    }
    verses.iter().find(|v| v.order == order)
}

/// True when the poem's radif is exactly `phrase` and the verse at `order`
/// ends with it.
pub fn is_radif(verses: &[Verse], phrase: &str, order: i64) -> bool {
    let wanted = words(phrase);
    if wanted.is_empty() {
        return false;
    }
    let Some(verse) = verse_at(verses, order) else {
        return false;
    };

    let radif = poem_radif(verses);
    !radif.is_empty() && radif == wanted && ends_with_words(&words(&verse.text), &radif)
}

/// True when the poem rhymes on `phrase`: the rhyme words of the opening
/// couplet and of the verse at `order` all end with it.
pub fn is_rhyme(verses: &[Verse], phrase: &str, order: i64) -> bool {
    let wanted = phrase.trim();
    if wanted.is_empty() || wanted.contains(char::is_whitespace) {
        return false;
    }
    let Some(verse) = verse_at(verses, order) else {
        return false;
    };
    let Some((first, second)) = opening_couplet(verses) else {
        return false;
    };

    let radif = poem_radif(verses);
    let rhymes = |line: &[&str]| rhyme_word(line, &radif).is_some_and(|w| w.ends_with(wanted));
    rhymes(&first) && rhymes(&second) && rhymes(&words(&verse.text))
}
