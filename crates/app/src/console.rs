use anyhow::{anyhow, bail, Context, Result};
use echoplay_core::TrackId;
use echoplay_engine::Snapshot;
use echoplay_notify::NotificationButton;

/// One line typed into the `run` console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Play(Option<TrackId>),
    Playlist {
        id: i64,
        shuffle: bool,
        start: Option<usize>,
    },
    Fusion(Vec<i64>),
    Pause,
    Toggle,
    Next,
    Prev,
    Stop,
    Seek(f32),
    Loop,
    Shuffle(bool),
    Press(NotificationButton),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play [SONG_ID]                 resume, or play one song
  playlist ID [shuffle] [from N] play a playlist
  fusion ID ID [ID..]            shuffle several playlists together
  pause | toggle | next | prev | stop
  seek PCT                       jump to a percentage of the track
  loop                           toggle repeat of the current track
  shuffle on|off
  press playpause|next|prev      tap a notification button
  status | help | quit";

/// Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let cmd = match head.to_ascii_lowercase().as_str() {
        "play" => match rest.as_slice() {
            [] => ConsoleCommand::Play(None),
            [id] => ConsoleCommand::Play(Some(parse_id(id)?)),
            _ => bail!("usage: play [SONG_ID]"),
        },
        "playlist" => parse_playlist(&rest)?,
        "fusion" => {
            if rest.len() < 2 {
                bail!("usage: fusion ID ID [ID..]");
            }
            let ids = rest
                .iter()
                .map(|w| parse_id(w))
                .collect::<Result<Vec<_>>>()?;
            ConsoleCommand::Fusion(ids)
        }
        "pause" => no_args(&rest, ConsoleCommand::Pause)?,
        "toggle" => no_args(&rest, ConsoleCommand::Toggle)?,
        "next" => no_args(&rest, ConsoleCommand::Next)?,
        "prev" | "previous" => no_args(&rest, ConsoleCommand::Prev)?,
        "stop" => no_args(&rest, ConsoleCommand::Stop)?,
        "loop" => no_args(&rest, ConsoleCommand::Loop)?,
        "status" => no_args(&rest, ConsoleCommand::Status)?,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "seek" => match rest.as_slice() {
            [pct] => {
                let pct = pct
                    .trim_end_matches('%')
                    .parse::<f32>()
                    .with_context(|| format!("not a percentage: {pct}"))?;
                if !pct.is_finite() {
                    bail!("not a percentage: {pct}");
                }
                ConsoleCommand::Seek(pct)
            }
            _ => bail!("usage: seek PCT"),
        },
        "shuffle" => match rest.as_slice() {
            ["on"] => ConsoleCommand::Shuffle(true),
            ["off"] => ConsoleCommand::Shuffle(false),
            _ => bail!("usage: shuffle on|off"),
        },
        "press" => match rest.as_slice() {
            [button] => ConsoleCommand::Press(
                NotificationButton::parse(button)
                    .ok_or_else(|| anyhow!("unknown button {button:?}"))?,
            ),
            _ => bail!("usage: press playpause|next|prev"),
        },
        other => bail!("unknown command {other:?}; type `help`"),
    };
    Ok(Some(cmd))
}

/// Single-line summary printed by `status`.
pub fn format_status(snap: &Snapshot) -> String {
    let Some(track) = &snap.track else {
        return match &snap.last_fault {
            Some(fault) => format!("idle (last error: {fault})"),
            None => "idle".to_string(),
        };
    };
    let mut line = format!(
        "{:?} #{} {} - {} [{:.0}%]",
        snap.state,
        track.id,
        track.artist,
        track.title,
        snap.progress_percent()
    );
    if let (Some(mode), Some(cursor)) = (snap.mode, snap.cursor) {
        line.push_str(&format!(" {:?} {}/{}", mode, cursor + 1, snap.queue_len));
    }
    if snap.is_shuffled {
        line.push_str(" shuffle");
    }
    if snap.is_looping {
        line.push_str(" loop");
    }
    line
}

fn parse_playlist(rest: &[&str]) -> Result<ConsoleCommand> {
    let usage = || anyhow!("usage: playlist ID [shuffle] [from INDEX]");
    let (id, mut tail) = rest.split_first().ok_or_else(usage)?;
    let id = parse_id(id)?;

    let mut shuffle = false;
    let mut start = None;
    while let Some((word, after)) = tail.split_first() {
        match *word {
            "shuffle" => {
                shuffle = true;
                tail = after;
            }
            "from" => {
                let (index, after) = after.split_first().ok_or_else(usage)?;
                start = Some(
                    index
                        .parse::<usize>()
                        .with_context(|| format!("not an index: {index}"))?,
                );
                tail = after;
            }
            _ => return Err(usage()),
        }
    }
    Ok(ConsoleCommand::Playlist { id, shuffle, start })
}

fn parse_id(word: &str) -> Result<i64> {
    word.parse::<i64>()
        .with_context(|| format!("not an id: {word}"))
}

fn no_args(rest: &[&str], cmd: ConsoleCommand) -> Result<ConsoleCommand> {
    if rest.is_empty() {
        Ok(cmd)
    } else {
        bail!("{cmd:?} takes no arguments")
    }
}
