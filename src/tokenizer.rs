//! 命令行分词
//!
//! Splits on spaces, tabs and newlines. A trailing `&`, either as its own
//! token or glued to the last word, marks the command as background.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub argv: Vec<String>,
    pub background: bool,
}

impl CommandLine {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Same rules for argv that arrives already split, e.g. process arguments.
    pub fn from_args(args: Vec<String>) -> Self {
        let mut argv: Vec<String> = args.into_iter().filter(|a| !a.is_empty()).collect();
        let background = strip_background_marker(&mut argv);
        Self { argv, background }
    }
}

pub fn tokenize(line: &str) -> CommandLine {
    let argv = line
        .split(|c: char| matches!(c, ' ' | '\t' | '\n'))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();
    CommandLine::from_args(argv)
}

fn strip_background_marker(argv: &mut Vec<String>) -> bool {
    let Some(last) = argv.last_mut() else {
        return false;
    };
    if !last.ends_with('&') {
        return false;
    }

    last.pop();
    if last.is_empty() {
        argv.pop();
    }
    true
}
