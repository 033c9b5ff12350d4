use nix::unistd::Pid;

pub type SchedResult<T> = Result<T, SchedError>;

#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    #[error("priority {0} is outside the accepted range 1..=4")]
    InvalidPriority(i64),

    #[error("invalid priority {0:?}")]
    MalformedPriority(String),

    #[error("command {0:?} contains an interior NUL byte")]
    InvalidCommand(String),

    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to create process for {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: nix::Error,
    },

    #[error("child for {command:?} exited before reaching its initial stop ({status})")]
    EarlyExit { command: String, status: String },

    #[error("failed to {op} process {pid}: {source}")]
    Signal {
        op: &'static str,
        pid: Pid,
        #[source]
        source: nix::Error,
    },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
