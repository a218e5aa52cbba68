use std::fmt::Display;
use std::path::Path;
use std::sync::OnceLock;

/// Styling for the human-facing subcommands. Plain text whenever stdout is
/// not a terminal or `NO_COLOR` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tone {
    Strong,
    Pass,
    Fail,
    Muted,
}

impl Tone {
    fn sgr(self) -> u8 {
        match self {
            Tone::Strong => 1,
            Tone::Muted => 2,
            Tone::Fail => 31,
            Tone::Pass => 32,
        }
    }
}

fn color_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var_os("NO_COLOR").is_none() && atty::is(atty::Stream::Stdout)
    })
}

pub(crate) fn paint(tone: Tone, text: impl Display) -> String {
    if color_enabled() {
        format!("\x1b[{}m{text}\x1b[0m", tone.sgr())
    } else {
        text.to_string()
    }
}

/// `~/...` for paths under the home directory, unchanged otherwise.
pub(crate) fn short_path(path: &Path) -> String {
    let rest = dirs::home_dir()
        .filter(|home| home.parent().is_some())
        .and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf));
    match rest {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}

#[cfg(test)]
pub(crate) fn strip_ansi(s: &str) -> String {
    let mut pieces = s.split('\x1b');
    let mut out = pieces.next().unwrap_or_default().to_string();
    for piece in pieces {
        out.push_str(piece.split_once('m').map_or("", |(_, text)| text));
    }
    out
}
