use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, ClearType},
    tty::IsTty,
};

/// `true` while the line editor holds the terminal in raw mode.
///
/// The Ctrl-C handler in `main.rs` reads this flag to suppress the spurious
/// newline it would otherwise print on platforms where SIGINT can still be
/// delivered during raw mode (primarily Windows).
pub static EDITOR_ACTIVE: AtomicBool = AtomicBool::new(false);

/// RAII guard: enables terminal raw mode on construction and restores it on
/// drop — even on panic — so the terminal is never left in a broken state.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        EDITOR_ACTIVE.store(true, Ordering::Relaxed);
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        EDITOR_ACTIVE.store(false, Ordering::Relaxed);
    }
}

const MAX_HISTORY_SIZE: usize = 1_000;

enum KeyAction {
    Submit(String),
    Eof,
    Continue,
}

/// A line editor with cursor movement and persistent history.
pub struct LineEditor {
    /// Current line content, stored as `char`s for Unicode-safe cursor math.
    buffer: Vec<char>,
    /// Cursor position within `buffer` (0 = before the first char).
    cursor: usize,
    /// Command history (oldest → newest).
    history: Vec<String>,
    /// Index into `history` during navigation; equals `history.len()` otherwise.
    history_idx: usize,
    /// Snapshot of the in-progress line taken the first time the user presses
    /// Up, restored when navigating back past the newest entry.
    saved_buffer: String,
    /// Path to `~/.tsh_history`, or `None` when HOME is not set.
    history_path: Option<PathBuf>,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    /// Create a new editor and load history from `~/.tsh_history`.
    pub fn new() -> Self {
        let history_path = history_file_path();
        let history = history_path
            .as_deref()
            .map(load_history)
            .unwrap_or_default();
        let history_idx = history.len();
        LineEditor {
            buffer: Vec::new(),
            cursor: 0,
            history,
            history_idx,
            saved_buffer: String::new(),
            history_path,
        }
    }

    /// Read one line of input, displaying `prompt` to the left.
    ///
    /// Returns `Ok(Some(line))` for a submitted line (possibly empty),
    /// `Ok(None)` on EOF. When stdin is not a TTY (scripts, piped input,
    /// integration tests) this falls back to a plain `read_line`.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        if !io::stdin().is_tty() {
            return read_line_plain();
        }

        self.buffer.clear();
        self.cursor = 0;
        self.history_idx = self.history.len();
        self.saved_buffer.clear();

        let _guard = RawModeGuard::enter()?;

        // Raw mode disables echo; the prompt is ours to draw.
        print!("{prompt}");
        io::stdout().flush()?;

        loop {
            let ev = match event::read() {
                Ok(ev) => ev,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let Event::Key(key) = ev else {
                continue; // ignore mouse, resize, paste, etc.
            };

            // Filter out key-release events that Windows may generate.
            if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
                continue;
            }

            match self.handle_key(key, prompt)? {
                KeyAction::Submit(line) => return Ok(Some(line)),
                KeyAction::Eof => return Ok(None),
                KeyAction::Continue => {}
            }
        }
    }

    /// Add `line` to the in-memory history and append it to the history
    /// file. Empty lines and consecutive duplicates are ignored.
    pub fn add_to_history(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.history.last().map(String::as_str) == Some(trimmed) {
            return;
        }
        self.history.push(trimmed.to_string());
        if self.history.len() > MAX_HISTORY_SIZE {
            let excess = self.history.len() - MAX_HISTORY_SIZE;
            self.history.drain(..excess);
        }
        if let Some(ref path) = self.history_path {
            append_to_history_file(path, trimmed);
        }
    }

    // ── Private ──────────────────────────────────────────────────────────────

    fn handle_key(
        &mut self,
        key: crossterm::event::KeyEvent,
        prompt: &str,
    ) -> io::Result<KeyAction> {
        use KeyCode::*;
        use KeyModifiers as Mod;

        match (key.code, key.modifiers) {
            (Enter, _) => {
                // Raw mode suppresses the terminal's automatic newline.
                print!("\r\n");
                io::stdout().flush()?;
                let line: String = self.buffer.iter().collect();
                return Ok(KeyAction::Submit(line));
            }

            // Ctrl-D: EOF on an empty line, delete-at-cursor otherwise.
            (Char('d'), Mod::CONTROL) => {
                if self.buffer.is_empty() {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(KeyAction::Eof);
                }
                if self.cursor < self.buffer.len() {
                    self.buffer.remove(self.cursor);
                }
                self.redraw(prompt)?;
            }

            // Ctrl-C: discard the current line, fresh prompt. In raw mode on
            // Unix, ISIG is off so this arrives as a key event rather than
            // SIGINT — the ctrlc handler does not fire here.
            (Char('c'), Mod::CONTROL) => {
                print!("^C\r\n{prompt}");
                io::stdout().flush()?;
                self.buffer.clear();
                self.cursor = 0;
                self.history_idx = self.history.len();
                self.saved_buffer.clear();
            }

            (Char('a'), Mod::CONTROL) | (Home, _) => {
                self.cursor = 0;
                self.sync_cursor(prompt)?;
            }
            (Char('e'), Mod::CONTROL) | (End, _) => {
                self.cursor = self.buffer.len();
                self.sync_cursor(prompt)?;
            }

            // Ctrl-U: kill from start of line to cursor.
            (Char('u'), Mod::CONTROL) => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
                self.redraw(prompt)?;
            }

            (Left, _) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.sync_cursor(prompt)?;
                }
            }
            (Right, _) => {
                if self.cursor < self.buffer.len() {
                    self.cursor += 1;
                    self.sync_cursor(prompt)?;
                }
            }

            (Up, _) => {
                self.history_prev();
                self.redraw(prompt)?;
            }
            (Down, _) => {
                self.history_next();
                self.redraw(prompt)?;
            }

            (Backspace, _) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                    self.redraw(prompt)?;
                }
            }
            (Delete, _) => {
                if self.cursor < self.buffer.len() {
                    self.buffer.remove(self.cursor);
                }
                self.redraw(prompt)?;
            }

            (Char(c), Mod::NONE) | (Char(c), Mod::SHIFT) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
                self.redraw(prompt)?;
            }

            _ => {}
        }

        Ok(KeyAction::Continue)
    }

    fn history_prev(&mut self) {
        if self.history_idx == 0 {
            return;
        }
        if self.history_idx == self.history.len() {
            self.saved_buffer = self.buffer.iter().collect();
        }
        self.history_idx -= 1;
        self.buffer = self.history[self.history_idx].chars().collect();
        self.cursor = self.buffer.len();
    }

    fn history_next(&mut self) {
        if self.history_idx >= self.history.len() {
            return;
        }
        self.history_idx += 1;
        self.buffer = if self.history_idx == self.history.len() {
            self.saved_buffer.chars().collect()
        } else {
            self.history[self.history_idx].chars().collect()
        };
        self.cursor = self.buffer.len();
    }

    /// Erase the current line and redraw prompt + buffer, then reposition
    /// the cursor.
    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let line: String = self.buffer.iter().collect();
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(
            io::stdout(),
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
        )?;
        print!("{prompt}{line}");
        io::stdout().flush()?;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }

    /// Move the terminal cursor to match `self.cursor` without redrawing.
    fn sync_cursor(&self, prompt: &str) -> io::Result<()> {
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }
}

/// Non-TTY path: no prompt, plain buffered read.
fn read_line_plain() -> io::Result<Option<String>> {
    let stdin = io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(line)),
        Err(e) => Err(e),
    }
}

fn history_file_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".tsh_history"))
}

fn load_history(path: &Path) -> Vec<String> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut history: Vec<String> = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    if history.len() > MAX_HISTORY_SIZE {
        let excess = history.len() - MAX_HISTORY_SIZE;
        history.drain(..excess);
    }
    history
}

fn append_to_history_file(path: &Path, line: &str) {
    let file = OpenOptions::new().create(true).append(true).open(path);
    if let Ok(mut file) = file {
        let _ = writeln!(file, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with_history(entries: &[&str]) -> LineEditor {
        let history: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
        let history_idx = history.len();
        LineEditor {
            buffer: Vec::new(),
            cursor: 0,
            history,
            history_idx,
            saved_buffer: String::new(),
            history_path: None,
        }
    }

    #[test]
    fn history_skips_empty_and_consecutive_duplicates() {
        let mut editor = editor_with_history(&[]);
        editor.add_to_history("ls");
        editor.add_to_history("   ");
        editor.add_to_history("ls");
        editor.add_to_history("echo hi");
        editor.add_to_history("ls");
        assert_eq!(editor.history, vec!["ls", "echo hi", "ls"]);
    }

    #[test]
    fn history_navigation_restores_in_progress_line() {
        let mut editor = editor_with_history(&["first", "second"]);
        editor.buffer = "draft".chars().collect();
        editor.cursor = editor.buffer.len();

        editor.history_prev();
        assert_eq!(editor.buffer.iter().collect::<String>(), "second");
        editor.history_prev();
        assert_eq!(editor.buffer.iter().collect::<String>(), "first");
        // Past the oldest entry: stays put.
        editor.history_prev();
        assert_eq!(editor.buffer.iter().collect::<String>(), "first");

        editor.history_next();
        editor.history_next();
        assert_eq!(editor.buffer.iter().collect::<String>(), "draft");
    }

    #[test]
    fn history_is_capped() {
        let mut editor = editor_with_history(&[]);
        for i in 0..(MAX_HISTORY_SIZE + 10) {
            editor.add_to_history(&format!("cmd {i}"));
        }
        assert_eq!(editor.history.len(), MAX_HISTORY_SIZE);
        assert_eq!(editor.history[0], "cmd 10");
    }
}
