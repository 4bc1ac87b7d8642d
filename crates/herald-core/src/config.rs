use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration shared by the supervisor and worker processes.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the session credential artifact.
    pub auth_dir: PathBuf,
    /// Full path of the credential artifact. Existence is all the core ever
    /// checks; content belongs to the gateway.
    pub session_file: PathBuf,
    /// Operator phone number used for pairing when no credential exists.
    pub bot_number: Option<String>,
    /// Address of the external messaging gateway.
    pub gateway_addr: String,
    /// Worker executable launched by the supervisor.
    pub worker_path: PathBuf,
    /// Delay before relaunching the worker after a crash or reset.
    pub restart_delay: Duration,
    /// Prefix users type before a command name.
    pub command_prefix: String,
    /// How long the worker waits for an uptime reply on the control channel.
    pub control_reply_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let auth_dir = env_path("AUTH_DIR").unwrap_or_else(|| PathBuf::from("auth"));
        let session_file_name =
            env_str("SESSION_FILE_NAME").unwrap_or_else(|| "creds.json".to_string());
        let session_file = auth_dir.join(session_file_name);

        let bot_number = env_str("BOT_NUMBER").and_then(non_empty);

        let gateway_addr =
            env_str("GATEWAY_ADDR").unwrap_or_else(|| "127.0.0.1:9331".to_string());

        let worker_path = env_path("WORKER_PATH")
            .or_else(sibling_worker)
            .ok_or_else(|| {
                Error::Config(
                    "WORKER_PATH is not set and no herald-worker binary was found next to this executable"
                        .to_string(),
                )
            })?;

        let restart_delay = Duration::from_millis(env_u64("RESTART_DELAY_MS").unwrap_or(1_000));
        let command_prefix = env_str("COMMAND_PREFIX").unwrap_or_else(|| ".".to_string());
        let control_reply_timeout =
            Duration::from_millis(env_u64("CONTROL_REPLY_TIMEOUT_MS").unwrap_or(5_000));

        Ok(Self {
            auth_dir,
            session_file,
            bot_number,
            gateway_addr,
            worker_path,
            restart_delay,
            command_prefix,
            control_reply_timeout,
        })
    }
}

fn sibling_worker() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let candidate = exe.parent()?.join("herald-worker");
    candidate.is_file().then_some(candidate)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
