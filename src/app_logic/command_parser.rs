use std::str::FromStr;

/*
 * Commands typed at the picker prompt. Each line is one command word followed
 * by an optional argument (the rest of the line, trimmed).
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Toggle(String),
    Open(String),
    ExpandAll,
    CollapseAll,
    Select(String),
    Clear,
    Ignore(String),
    Copy,
    Show,
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "\
Commands:
  toggle|t <path>    check or uncheck a node (the repository root is '/')
  open|o <path>      expand or collapse a directory
  expand             expand every directory
  collapse           collapse every directory
  select <glob>      replace the selection with every node matching the glob
  clear              uncheck everything
  ignore <pattern>   add a gitignore-style pattern to the saved ignore rules
  copy               copy the selected files
  show               print the tree
  help               print this help
  quit|q             exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    Empty,
    UnknownCommand(String),
    MissingArgument(&'static str),
    UnexpectedArgument(&'static str),
}

impl std::fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandParseError::Empty => write!(f, "No command given"),
            CommandParseError::UnknownCommand(word) => {
                write!(f, "Unknown command '{word}', type 'help' for a list")
            }
            CommandParseError::MissingArgument(command) => {
                write!(f, "'{command}' needs an argument")
            }
            CommandParseError::UnexpectedArgument(command) => {
                write!(f, "'{command}' takes no argument")
            }
        }
    }
}

impl std::error::Error for CommandParseError {}

fn required(command: &'static str, argument: &str) -> Result<String, CommandParseError> {
    if argument.is_empty() {
        Err(CommandParseError::MissingArgument(command))
    } else {
        Ok(argument.to_string())
    }
}

fn bare(
    command: &'static str,
    argument: &str,
    parsed: UserCommand,
) -> Result<UserCommand, CommandParseError> {
    if argument.is_empty() {
        Ok(parsed)
    } else {
        Err(CommandParseError::UnexpectedArgument(command))
    }
}

impl FromStr for UserCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, argument) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandParseError::Empty),
            "toggle" | "t" => required("toggle", argument).map(UserCommand::Toggle),
            "open" | "o" => required("open", argument).map(UserCommand::Open),
            "select" => required("select", argument).map(UserCommand::Select),
            "ignore" => required("ignore", argument).map(UserCommand::Ignore),
            "expand" => bare("expand", argument, UserCommand::ExpandAll),
            "collapse" => bare("collapse", argument, UserCommand::CollapseAll),
            "clear" => bare("clear", argument, UserCommand::Clear),
            "copy" => bare("copy", argument, UserCommand::Copy),
            "show" | "ls" => bare("show", argument, UserCommand::Show),
            "help" | "?" => Ok(UserCommand::Help),
            "quit" | "q" | "exit" => Ok(UserCommand::Quit),
            _ => Err(CommandParseError::UnknownCommand(word.to_string())),
        }
    }
}
