/// A parsed bot command, from either a prefixed message or a slash
/// interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Pause,
    Resume,
    Skip,
    Stop,
    Queue,
    NowPlaying,
    /// 24/7 mode
    Persistent,
    /// Owner only
    Say(String),
    /// Who runs this bot
    Owner,
    Help,
}

impl Command {
    /// Parses `content` if it starts with `prefix`. Command names are case
    /// insensitive; unknown names yield `None`.
    pub fn parse_prefixed(content: &str, prefix: &str) -> Option<Self> {
        let rest = content.trim_start().strip_prefix(prefix)?;
        let rest = rest.trim();
        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        Self::from_name(name, argument)
    }

    /// Builds a command from a slash interaction name and its single string
    /// option, if any.
    pub fn from_slash(name: &str, argument: Option<&str>) -> Option<Self> {
        Self::from_name(name, argument.unwrap_or_default().trim())
    }

    fn from_name(name: &str, argument: &str) -> Option<Self> {
        let command = match name.to_ascii_lowercase().as_str() {
            "play" | "p" => Self::Play(argument.to_string()),
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "skip" => Self::Skip,
            "stop" => Self::Stop,
            "queue" => Self::Queue,
            "nowplaying" | "np" => Self::NowPlaying,
            "247" => Self::Persistent,
            "say" => Self::Say(argument.to_string()),
            "owner" => Self::Owner,
            "help" => Self::Help,
            _ => return None,
        };

        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Play(_) => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Skip => "skip",
            Self::Stop => "stop",
            Self::Queue => "queue",
            Self::NowPlaying => "nowplaying",
            Self::Persistent => "247",
            Self::Say(_) => "say",
            Self::Owner => "owner",
            Self::Help => "help",
        }
    }

    /// Commands that may take long enough to need a deferred response.
    pub fn is_slow(&self) -> bool {
        matches!(self, Self::Play(_) | Self::Persistent)
    }
}

/// The command list shown by `help`.
pub fn help_text(prefix: &str) -> String {
    let entries = [
        ("play <query>", "Play a song from YouTube by name or URL (alias: p)"),
        ("pause", "Pause the current song"),
        ("resume", "Resume the current song"),
        ("skip", "Skip to the next song"),
        ("stop", "Stop playback and leave voice"),
        ("queue", "Show the current song queue"),
        ("nowplaying", "Show the currently playing song (alias: np)"),
        ("247", "Stay in your voice channel and rejoin when someone comes back"),
        ("say <message>", "Make the bot say something (owner only)"),
        ("owner", "Show who owns the bot"),
        ("help", "Show this list"),
    ];

    let mut text = String::from("🎵 **Command List**\n");
    for (usage, description) in entries {
        text.push_str(&format!("`{prefix}{usage}` - {description}\n"));
    }
    text.push_str("Every command is also available as a slash command.");
    text
}
