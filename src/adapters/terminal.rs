use std::io;

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};

use crate::core::Screen;

pub struct TerminalScreen;

impl Screen for TerminalScreen {
    fn clear(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))
    }
}
