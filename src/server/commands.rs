//! Inbound message command parsing: `@电影`, `@川小农` and `@username`
//! mentions.

use std::sync::LazyLock;

use regex::Regex;

use crate::assistant::ASSISTANT_NAME;

/// Command word for playing a linked video.
pub const MOVIE_COMMAND: &str = "电影";

static MOVIE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@电影\s+(.+)").expect("movie pattern"));

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\S+)").expect("mention pattern"));

/// A recognized chat command. The movie command is looked for anywhere in
/// the message; the assistant trigger only as a prefix, and only when the
/// movie command did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Movie { url: String },
    Assistant { query: String },
}

pub fn parse_command(text: &str) -> Option<Command> {
    if let Some(caps) = MOVIE_RE.captures(text) {
        return Some(Command::Movie {
            url: normalize_movie_url(caps[1].trim()),
        });
    }
    if let Some(rest) = text.strip_prefix(&format!("@{ASSISTANT_NAME}")) {
        return Some(Command::Assistant {
            query: rest.trim().to_string(),
        });
    }
    None
}

/// Rewrite video URLs for player compatibility: expand youtu.be short links
/// and default to https for schemeless URLs.
fn normalize_movie_url(url: &str) -> String {
    if let Some(video_id) = url.strip_prefix("https://youtu.be/") {
        format!("https://www.youtube.com/watch?v={video_id}")
    } else if !url.starts_with("http://") && !url.starts_with("https://") {
        format!("https://{url}")
    } else {
        url.to_string()
    }
}

/// Collect `@username` mentions of currently-online users, skipping the two
/// command words.
pub fn extract_mentions<F>(text: &str, is_online: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    MENTION_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .filter(|name| name != MOVIE_COMMAND && name != ASSISTANT_NAME && is_online(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_command() {
        assert_eq!(
            parse_command("@电影 https://example.com/clip.mp4"),
            Some(Command::Movie {
                url: "https://example.com/clip.mp4".to_string()
            })
        );
    }

    #[test]
    fn test_movie_url_youtu_be_rewrite() {
        assert_eq!(
            parse_command("@电影 https://youtu.be/abc123"),
            Some(Command::Movie {
                url: "https://www.youtube.com/watch?v=abc123".to_string()
            })
        );
    }

    #[test]
    fn test_movie_url_scheme_default() {
        assert_eq!(
            parse_command("@电影 example.com/clip.mp4"),
            Some(Command::Movie {
                url: "https://example.com/clip.mp4".to_string()
            })
        );
        // Explicit http is left alone.
        assert_eq!(
            parse_command("@电影 http://example.com/clip.mp4"),
            Some(Command::Movie {
                url: "http://example.com/clip.mp4".to_string()
            })
        );
    }

    #[test]
    fn test_movie_command_mid_message() {
        // The movie command is recognized anywhere, not just as a prefix.
        assert!(matches!(
            parse_command("看这个 @电影 example.com/a.mp4"),
            Some(Command::Movie { .. })
        ));
    }

    #[test]
    fn test_assistant_trigger_strips_prefix() {
        assert_eq!(
            parse_command("@川小农 现在几点"),
            Some(Command::Assistant {
                query: "现在几点".to_string()
            })
        );
    }

    #[test]
    fn test_assistant_trigger_must_be_prefix() {
        assert_eq!(parse_command("问问 @川小农 现在几点"), None);
    }

    #[test]
    fn test_plain_text_is_no_command() {
        assert_eq!(parse_command("just chatting"), None);
    }

    #[test]
    fn test_mentions_filter_command_words_and_offline() {
        let online = ["alice", "bob"];
        let mentions = extract_mentions("@alice @电影 @川小农 @ghost @bob hi", |name| {
            online.contains(&name)
        });
        assert_eq!(mentions, vec!["alice".to_string(), "bob".to_string()]);
    }
}
