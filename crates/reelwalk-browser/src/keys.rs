/// Keys the engine presses. Values are the WebDriver code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    ArrowLeft,
    ArrowRight,
}

impl Key {
    #[must_use]
    pub fn code_point(self) -> char {
        match self {
            Key::Enter => '\u{E007}',
            Key::Escape => '\u{E00C}',
            Key::ArrowLeft => '\u{E012}',
            Key::ArrowRight => '\u{E014}',
        }
    }
}
