//! Logging utilities with colored output and a build progress bar.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `ProgressBar` for tracking finished templates during a build
//!
//! # Example
//!
//! ```ignore
//! log!("build"; "compiling {} templates", count);
//!
//! let progress = ProgressBar::new("build", templates.len());
//! progress.inc();
//! progress.finish();
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::{
        OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Whether a progress bar currently owns the last terminal line
static BAR_ACTIVE: AtomicBool = AtomicBool::new(false);

// ============================================================================
// Layout Constants
// ============================================================================
//
// Progress bar format: "[build] [████░░░░] 3/12"
//                       ^-----^ ^-------^ ^--^
//                       prefix  bar       count

/// Length of brackets around module name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[module] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;
/// Bar wrapper: " []" (space + brackets around progress bar)
const BAR_WRAPPER_LEN: usize = 3;
/// Minimum progress bar width in characters
const MIN_BAR_WIDTH: usize = 10;
/// Maximum progress bar width in characters
const MAX_BAR_WIDTH: usize = 40;

/// Calculate total prefix length for a module name.
///
/// Returns: `module.len() + 3` (for `[`, `]`, and trailing space)
#[inline]
const fn calc_prefix_len(module_len: usize) -> usize {
    module_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

/// Get terminal width, cached after first call.
/// Falls back to 120 columns if detection fails.
fn get_terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

// ============================================================================
// Progress Bar
// ============================================================================

/// Single-line progress bar kept below the log output.
///
/// Log lines written while the bar is active are printed above it.
pub struct ProgressBar {
    prefix: ColoredString,
    prefix_len: usize,
    total: usize,
    current: AtomicUsize,
    lock: Mutex<()>,
}

impl ProgressBar {
    /// Create a progress bar, or `None` when there is at most one item.
    pub fn new(module: &str, total: usize) -> Option<Self> {
        if total <= 1 {
            return None;
        }

        let mut stdout = stdout().lock();
        writeln!(stdout).ok();
        stdout.flush().ok();
        BAR_ACTIVE.store(true, Ordering::SeqCst);

        Some(Self {
            prefix: colorize_prefix(module, &module.to_ascii_lowercase()),
            prefix_len: calc_prefix_len(module.len()),
            total,
            current: AtomicUsize::new(0),
            lock: Mutex::new(()),
        })
    }

    /// Advance the bar by one finished item.
    pub fn inc(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        self.display(current);
    }

    fn display(&self, current: usize) {
        let _guard = self.lock.lock();

        let progress_text = format!("{}/{}", current, self.total);
        let overhead = self.prefix_len + BAR_WRAPPER_LEN + 1 + progress_text.len();
        let available = (get_terminal_width() as usize).saturating_sub(overhead);
        let bar_width = available.clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);

        let filled = (current * bar_width) / self.total;
        let bar = "█".repeat(filled) + &"░".repeat(bar_width.saturating_sub(filled));

        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveUp(1)).ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        writeln!(stdout, "{} [{}] {}", self.prefix, bar, progress_text).ok();
        stdout.flush().ok();
    }

    /// Clear the bar from the terminal.
    pub fn finish(&self) {
        if !BAR_ACTIVE.swap(false, Ordering::SeqCst) {
            return;
        }
        let _guard = self.lock.lock();
        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveUp(1)).ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        stdout.flush().ok();
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix.
///
/// Automatically truncates long single-line messages to fit terminal width.
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);
    let width = get_terminal_width() as usize;

    let mut stdout = stdout().lock();

    let bar_active = BAR_ACTIVE.load(Ordering::SeqCst);
    if bar_active {
        execute!(stdout, cursor::MoveUp(1)).ok();
        execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
    }

    if message.contains('\n') {
        writeln!(stdout, "{prefix} {message}").ok();
    } else {
        let max_msg_len = width.saturating_sub(calc_prefix_len(module.len()));
        writeln!(stdout, "{prefix} {}", truncate_str(message, max_msg_len)).ok();
    }

    // keep a line for the bar to redraw into
    if bar_active {
        writeln!(stdout).ok();
    }

    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type.
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module_lower {
        "build" | "write" => prefix.bright_green().bold(),
        "style" | "image" => prefix.bright_blue().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within `max_len` bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Tests
// ============================================================================
