//! Prefix command parsing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Hello,
    Help,
    AddRepo {
        url: String,
        name: String,
        branch: Option<String>,
    },
    AnalyzeRepo {
        name: String,
        question: String,
    },
}

/// Why a prefixed message did not become a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Unknown(String),
    MissingArguments { usage: String },
}

/// Parse `content` if it starts with `prefix`.
///
/// Returns `None` for ordinary chat messages. The question of
/// `analyze-repo` keeps its original spacing.
#[must_use]
pub fn parse_command(content: &str, prefix: &str) -> Option<Result<Command, ParseError>> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let (name, rest) = split_word(body);
    if name.is_empty() {
        return None;
    }

    let parsed = match name.to_lowercase().as_str() {
        "hello" => Ok(Command::Hello),
        "help" => Ok(Command::Help),
        "add-repo" => {
            let mut args = rest.split_whitespace();
            match (args.next(), args.next()) {
                (Some(url), Some(name)) => Ok(Command::AddRepo {
                    url: url.to_owned(),
                    name: name.to_owned(),
                    branch: args.next().map(str::to_owned),
                }),
                _ => Err(ParseError::MissingArguments {
                    usage: format!("{prefix}add-repo <repo_url> <repo_name> [branch]"),
                }),
            }
        }
        "analyze-repo" => {
            let (repo, question) = split_word(rest);
            let question = question.trim();
            if repo.is_empty() || question.is_empty() {
                Err(ParseError::MissingArguments {
                    usage: format!("{prefix}analyze-repo <repo_name> <question>"),
                })
            } else {
                Ok(Command::AnalyzeRepo {
                    name: repo.to_owned(),
                    question: question.to_owned(),
                })
            }
        }
        other => Err(ParseError::Unknown(other.to_owned())),
    };
    Some(parsed)
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}

#[must_use]
pub fn help_text(prefix: &str) -> String {
    format!(
        "**RepoMind commands**\n\
         `{prefix}add-repo <repo_url> <repo_name> [branch]`: clone and index a GitHub repository (branch defaults to main)\n\
         `{prefix}analyze-repo <repo_name> <question>`: ask a question about an indexed repository\n\
         `{prefix}hello`: say hello\n\
         `{prefix}help`: show this message"
    )
}
