//! Fenced code tracking for the shortcode line scanner.
//!
//! Shortcode tags inside fenced code are literal text, so the scanner asks
//! this module, line by line, whether it is currently inside a fence.

/// Fence parsing phases tracked across lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FencePhase {
    /// Not currently inside a fence.
    #[default]
    Outside,
    /// Within fence contents.
    InsideFence,
}

/// Fence state carried from one line to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FenceState {
    /// Current fence phase.
    pub phase: FencePhase,
    /// Fence marker character (`` ` `` or `~`).
    pub marker: Option<char>,
    /// Length of the opening fence run.
    pub length: usize,
}

/// Outcome of processing a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOutcome {
    /// State to carry into the next line.
    pub next_state: FenceState,
    /// Whether the line belongs to a fence (opener, content or closer).
    pub in_code: bool,
}

/// Advance fence state based on a single line of text.
///
/// `line` should already have any block quote prefix removed.
pub fn advance_fence_state(line: &str, state: FenceState) -> LineOutcome {
    let (columns, offset) = leading_whitespace(line);
    let rest = &line[offset..];

    match state.phase {
        FencePhase::Outside => {
            // 4+ columns is indented code, never a fence opener.
            if columns <= 3
                && let Some((marker, length)) = fence_run(rest)
                && (marker == '~' || !rest[length..].contains('`'))
            {
                return LineOutcome {
                    next_state: FenceState {
                        phase: FencePhase::InsideFence,
                        marker: Some(marker),
                        length,
                    },
                    in_code: true,
                };
            }
            LineOutcome {
                next_state: state,
                in_code: false,
            }
        }
        FencePhase::InsideFence => {
            let closes = columns <= 3
                && fence_run(rest).is_some_and(|(marker, length)| {
                    Some(marker) == state.marker
                        && length >= state.length
                        && rest[length..].trim().is_empty()
                });
            LineOutcome {
                next_state: if closes { FenceState::default() } else { state },
                in_code: true,
            }
        }
    }
}

/// Returns (visual columns, byte offset) of leading whitespace.
/// Tabs advance to the next 4-column stop.
fn leading_whitespace(line: &str) -> (usize, usize) {
    let mut columns = 0;
    let mut bytes = 0;
    for b in line.bytes() {
        match b {
            b' ' => columns += 1,
            b'\t' => columns += 4 - (columns % 4),
            _ => break,
        }
        bytes += 1;
    }
    (columns, bytes)
}

fn fence_run(text: &str) -> Option<(char, usize)> {
    let first = text.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let length = text.chars().take_while(|c| *c == first).count();
    (length >= 3).then_some((first, length))
}
