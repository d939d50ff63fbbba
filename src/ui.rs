//! Terminal output for ccx: labels, tables, spinners and secret masking.
//!
//! Colors are disabled, in priority order, by `--no-color`, `NO_COLOR`,
//! `TERM=dumb`, or a non-TTY stdout when the mode is `auto`.

use anstream::{eprintln, println};
use anstyle::{AnsiColor, Color, Style};
use comfy_table::{Cell, ContentArrangement, Table, presets};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Color mode for output
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Always emit colors, even when piped
    Always,
    /// Color only when stdout is a terminal
    #[default]
    Auto,
    /// Never emit colors
    Never,
}

impl std::str::FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "auto" => Ok(Self::Auto),
            "never" => Ok(Self::Never),
            other => Err(format!("invalid color mode: {} (expected always, auto or never)", other)),
        }
    }
}

/// Show only the tail of a secret: `***` plus the last 8 characters
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::from("(empty)");
    }
    let chars: Vec<char> = secret.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(8)..].iter().collect();
    format!("***{}", tail)
}

/// Resolved display settings
#[derive(Debug, Clone)]
pub struct Ui {
    /// Whether ANSI styling is applied to labels and tables
    pub color_enabled: bool,
    /// Spinners need both a TTY and color
    pub spinner_enabled: bool,
    /// Route every message to stderr, leaving stdout for [`Ui::stdout`]
    pub messages_to_stderr: bool,
}

impl Default for Ui {
    fn default() -> Self {
        Self::new(ColorMode::Auto, false)
    }
}

impl Ui {
    /// Resolve color and spinner support from the mode, flags and environment
    pub fn new(mode: ColorMode, force_no_color: bool) -> Self {
        let color_enabled = !force_no_color && color_allowed_by_env() && match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        };

        if !color_enabled {
            anstream::ColorChoice::write_global(anstream::ColorChoice::Never);
        }

        Self {
            color_enabled,
            spinner_enabled: color_enabled && std::io::stdout().is_terminal(),
            messages_to_stderr: false,
        }
    }

    /// Keep stdout clean for machine-readable output such as `eval` lines
    pub fn set_messages_to_stderr(&mut self, enabled: bool) {
        self.messages_to_stderr = enabled;
        if enabled {
            self.spinner_enabled = false;
        }
    }

    fn emit(&self, line: &str) {
        if self.messages_to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn paint(&self, s: &str, style: Style) -> String {
        if self.color_enabled {
            format!("{style}{}{style:#}", s)
        } else {
            s.to_string()
        }
    }

    fn label(&self, text: &str, color: AnsiColor) -> String {
        self.paint(text, Style::new().fg_color(Some(Color::Ansi(color))).bold())
    }

    /// Print a success message with a green OK label
    pub fn ok(&self, msg: impl AsRef<str>) {
        self.emit(&format!("{} {}", self.label("OK", AnsiColor::Green), msg.as_ref()));
    }

    /// Print a warning with a yellow WARN label
    pub fn warn(&self, msg: impl AsRef<str>) {
        self.emit(&format!("{} {}", self.label("WARN", AnsiColor::Yellow), msg.as_ref()));
    }

    /// Red ERROR label on stderr
    pub fn err(&self, msg: impl AsRef<str>) {
        eprintln!("{} {}", self.label("ERROR", AnsiColor::Red), msg.as_ref());
    }

    /// Print an informational message with a cyan INFO label
    pub fn info(&self, msg: impl AsRef<str>) {
        self.emit(&format!("{} {}", self.label("INFO", AnsiColor::Cyan), msg.as_ref()));
    }

    /// Format text as dimmed (for secondary information)
    pub fn dim(&self, s: impl AsRef<str>) -> String {
        self.paint(
            s.as_ref(),
            Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))),
        )
    }

    /// Format text as bold
    pub fn bold(&self, s: impl AsRef<str>) -> String {
        self.paint(s.as_ref(), Style::new().bold())
    }

    /// Format text in the given foreground color
    pub fn colored(&self, s: impl AsRef<str>, color: AnsiColor) -> String {
        self.paint(s.as_ref(), Style::new().fg_color(Some(Color::Ansi(color))))
    }

    /// Success icon, ASCII when colors are off
    pub fn icon_ok(&self) -> &'static str {
        if self.color_enabled { "✓" } else { "[OK]" }
    }

    /// Failure icon, ASCII when colors are off
    pub fn icon_err(&self) -> &'static str {
        if self.color_enabled { "✗" } else { "[X]" }
    }

    /// Warning icon, ASCII when colors are off
    pub fn icon_warn(&self) -> &'static str {
        if self.color_enabled { "⚠" } else { "[!]" }
    }

    // -------------------------------------------------------------------------
    // Tables
    // -------------------------------------------------------------------------

    /// Bordered table for provider listings
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(if self.color_enabled {
            presets::UTF8_FULL_CONDENSED
        } else {
            presets::ASCII_MARKDOWN
        });
        table
    }

    /// Borderless table for label/value blocks
    pub fn simple_table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(presets::NOTHING);
        table
    }

    /// Plain table cell
    pub fn cell(&self, content: impl Into<String>) -> Cell {
        Cell::new(content.into())
    }

    /// Header cell, bold when colors are on
    pub fn header_cell(&self, content: impl Into<String>) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.add_attribute(comfy_table::Attribute::Bold)
        } else {
            cell
        }
    }

    /// Colored via comfy-table so column widths stay correct
    pub fn colored_cell(&self, content: impl Into<String>, color: AnsiColor) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.fg(comfy_color(color))
        } else {
            cell
        }
    }

    /// Two-column `label: value` table
    pub fn key_values<'a>(&self, rows: impl IntoIterator<Item = (&'a str, String)>) -> Table {
        let mut table = self.simple_table();
        for (label, value) in rows {
            table.add_row(vec![self.cell(format!("{}:", label)), self.cell(value)]);
        }
        table
    }

    // -------------------------------------------------------------------------
    // Spinners
    // -------------------------------------------------------------------------

    /// Start a spinner with a message; hidden when spinners are disabled
    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        let pb = if self.spinner_enabled {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.cyan} {msg}")
            {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(message.into());
        pb
    }

    /// Stop a spinner and print the result line
    pub fn spinner_finish(&self, pb: &ProgressBar, success: bool, msg: impl Into<String>) {
        let msg = msg.into();
        pb.finish_and_clear();
        if success {
            self.ok(msg);
        } else {
            self.err(msg);
        }
    }

    // -------------------------------------------------------------------------
    // Plain output
    // -------------------------------------------------------------------------

    /// Print a plain line
    pub fn println(&self, msg: impl AsRef<str>) {
        self.emit(msg.as_ref());
    }

    /// Print an empty line
    pub fn newline(&self) {
        self.emit("");
    }

    /// Print a bold section title
    pub fn section(&self, title: impl AsRef<str>) {
        self.emit(&self.bold(title));
    }

    /// Write to stdout regardless of where messages go
    pub fn stdout(&self, msg: impl AsRef<str>) {
        println!("{}", msg.as_ref());
    }
}

fn color_allowed_by_env() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    !std::env::var("TERM").is_ok_and(|t| t == "dumb")
}

fn comfy_color(color: AnsiColor) -> comfy_table::Color {
    use comfy_table::Color as C;
    match color {
        AnsiColor::Black => C::Black,
        AnsiColor::Red | AnsiColor::BrightRed => C::Red,
        AnsiColor::Green | AnsiColor::BrightGreen => C::Green,
        AnsiColor::Yellow | AnsiColor::BrightYellow => C::Yellow,
        AnsiColor::Blue | AnsiColor::BrightBlue => C::Blue,
        AnsiColor::Magenta | AnsiColor::BrightMagenta => C::Magenta,
        AnsiColor::Cyan | AnsiColor::BrightCyan => C::Cyan,
        AnsiColor::White | AnsiColor::BrightWhite => C::White,
        AnsiColor::BrightBlack => C::DarkGrey,
    }
}
