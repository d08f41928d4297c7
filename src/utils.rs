/// Formats `count` followed by `noun`, adding an `s` unless there is exactly one.
///
/// Only regular plurals are handled, which is all the outcome messages need.
pub fn count_noun(count: usize, noun: &str) -> String {
    match count {
        1 => format!("1 {noun}"),
        n => format!("{n} {noun}s"),
    }
}

#[test]
fn counted_nouns() {
    assert_eq!(count_noun(1, "issue"), "1 issue");
    assert_eq!(count_noun(0, "issue"), "0 issues");
    assert_eq!(count_noun(3, "new issue reference"), "3 new issue references");
}
