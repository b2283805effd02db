use crate::types::Choice;

/// Number of rounds whose choice differs from the round immediately before it.
pub fn count_switches(choices: &[Choice]) -> u32 {
    choices.windows(2).filter(|pair| pair[0] != pair[1]).count() as u32
}

/// Switches among the first `window` rounds. A pair counts only when both rounds are inside.
pub fn switches_first_window(choices: &[Choice], window: usize) -> u32 {
    let end = window.min(choices.len());
    count_switches(&choices[..end])
}

/// Switches among the last `window` rounds.
pub fn switches_last_window(choices: &[Choice], window: usize) -> u32 {
    let start = choices.len().saturating_sub(window);
    count_switches(&choices[start..])
}
