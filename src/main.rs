//! Command-line player for Harmoni soundscapes.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use harmoni::audio::{
    AudioBackend, CpalBackend, PlaybackEngine, SimulatedBackend, available_devices,
    available_hosts,
};
use harmoni::catalog::SoundLibrary;
use harmoni::clipboard::SystemClipboard;
use harmoni::config::{self, AppSettings};
use harmoni::mix::{JsonFileStore, MixId};
use harmoni::session::Session;
use harmoni::timer::{DURATION_OPTIONS, TimerSignal, TimerState};
use harmoni::{app_dirs, logging};
use url::Url;

const FRAME: Duration = Duration::from_millis(100);

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Default)]
struct Options {
    list: bool,
    devices: bool,
    plays: Vec<(String, Option<f32>)>,
    mix: Option<String>,
    timer_minutes: Option<u32>,
    fade_seconds: Option<u32>,
    share: bool,
    sounds_dir: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    let directive = if options.verbose { "harmoni=debug" } else { "warn,harmoni=info" };
    if let Err(err) = logging::init(directive) {
        eprintln!("Logging disabled: {err}");
    }

    let mut settings = config::load_or_default().map_err(|err| err.to_string())?;
    if let Some(dir) = &options.sounds_dir {
        settings.sounds_dir = Some(dir.clone());
    }
    if let Some(minutes) = options.timer_minutes {
        settings.timer.duration_minutes = minutes;
    }
    if let Some(seconds) = options.fade_seconds {
        settings.timer.fade_out_seconds = seconds;
    }
    let store = JsonFileStore::new(app_dirs::data_dir().map_err(|err| err.to_string())?);

    if options.devices {
        print_devices()?;
        return Ok(());
    }
    if options.list {
        print_catalog(store);
        return Ok(());
    }

    if options.dry_run {
        let backend = SimulatedBackend::new();
        let clock = backend.clock();
        play(backend, store, &settings, &options, move |elapsed| {
            clock.advance(elapsed)
        })
    } else {
        let backend = CpalBackend::new(settings.audio_output.clone());
        play(backend, store, &settings, &options, thread::sleep)
    }
}

fn play<B: AudioBackend>(
    backend: B,
    store: JsonFileStore,
    settings: &AppSettings,
    options: &Options,
    mut wait: impl FnMut(Duration),
) -> Result<(), String> {
    let mut engine = PlaybackEngine::new(backend);
    engine.set_sounds_root(settings.sounds_dir.clone());
    engine
        .initialize()
        .map_err(|err| format!("Audio output unavailable: {err}"))?;
    let mut session = Session::new(engine, store, settings);
    for (id, result) in session.load_catalog() {
        if let Err(err) = result {
            eprintln!("Skipping {id}: {err}");
        }
    }

    let mut shared_mix: Option<MixId> = None;
    if let Some(mix) = &options.mix {
        let url = share_link(&settings.share_origin, mix)?;
        let (imported, _) = session
            .import_shared(&url)
            .ok_or_else(|| "The shared mix could not be read".to_string())?;
        println!("Imported \"{}\"", imported.name);
        shared_mix = Some(imported.id);
    }
    for (id, volume) in &options.plays {
        session.play_sound(id);
        if let Some(volume) = volume {
            session.change_volume(id, *volume);
        }
    }
    if session.active_sounds().is_empty() {
        println!("Nothing to play. Use --play <id> or --mix <token>; --list shows sounds.");
        return Ok(());
    }
    println!(
        "Playing: {}",
        session
            .active_sounds()
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    if options.share {
        let id = match shared_mix {
            Some(id) => id,
            None => session.save_mix("Harmoni Mix").map_err(|err| err.to_string())?.id,
        };
        let outcome = session
            .share_mix(&id, None, &mut SystemClipboard)
            .map_err(|err| err.to_string())?;
        println!("{}", outcome.url);
        if outcome.success {
            println!("{}", outcome.message);
        }
    }

    if options.timer_minutes.is_none() {
        if options.dry_run {
            return Ok(());
        }
        loop {
            wait(FRAME);
            session.engine_mut().poll();
        }
    }

    session.start_timer().map_err(|err| err.to_string())?;
    println!("Sleep timer: {}", session.timer().display());
    let mut last = Instant::now();
    loop {
        wait(FRAME);
        let elapsed = if options.dry_run {
            FRAME
        } else {
            let now = Instant::now();
            let elapsed = now - last;
            last = now;
            elapsed
        };
        for tick in session.advance(elapsed) {
            match tick.signal {
                Some(TimerSignal::FadeStarted) => println!("Fading out..."),
                Some(TimerSignal::Completed { .. }) => println!("Sleep timer finished"),
                None if tick.remaining_seconds % 60 == 0 => {
                    println!("Sleep timer: {}", session.timer().display())
                }
                None => {}
            }
        }
        let done = session.timer().state() == TimerState::Completed && !session.is_fading_out();
        if done {
            return Ok(());
        }
    }
}

/// Accept a full share link or a bare token.
fn share_link(origin: &str, value: &str) -> Result<Url, String> {
    if let Ok(url) = Url::parse(value)
        && url.has_host()
    {
        return Ok(url);
    }
    Url::parse(&format!("{origin}?mix={value}")).map_err(|err| format!("Invalid mix: {err}"))
}

fn print_catalog(store: JsonFileStore) {
    let library = SoundLibrary::new(store);
    for sound in library.all() {
        println!(
            "{:<16} {:<11} {:<18} {}",
            sound.id.as_str(),
            sound.category.as_str(),
            sound.name,
            sound.description
        );
    }
}

fn print_devices() -> Result<(), String> {
    for host in available_hosts() {
        let marker = if host.is_default { " (default)" } else { "" };
        println!("{}{marker}", host.label);
        let devices = available_devices(&host.id).map_err(|err| err.to_string())?;
        for device in devices {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("  {}{marker}", device.name);
        }
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(None);
    }
    let mut options = Options::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .ok_or_else(|| format!("Missing value for {flag}"))
        };
        match arg.as_str() {
            "--list" => options.list = true,
            "--devices" => options.devices = true,
            "--share" => options.share = true,
            "--dry-run" => options.dry_run = true,
            "--verbose" | "-v" => options.verbose = true,
            "--play" => options.plays.push(parse_play(&value("--play")?)?),
            "--mix" => options.mix = Some(value("--mix")?),
            "--timer" => options.timer_minutes = Some(parse_timer(&value("--timer")?)?),
            "--fade" => options.fade_seconds = Some(parse_number(&value("--fade")?, "--fade")?),
            "--sounds-dir" => options.sounds_dir = Some(PathBuf::from(value("--sounds-dir")?)),
            _ => return Err(format!("Unknown argument: {arg}")),
        }
    }
    Ok(Some(options))
}

/// `ID` or `ID=VOLUME`.
fn parse_play(value: &str) -> Result<(String, Option<f32>), String> {
    match value.split_once('=') {
        Some((id, volume)) => {
            let volume = volume
                .parse::<f32>()
                .map_err(|_| format!("Invalid volume in --play {value}"))?;
            Ok((id.to_string(), Some(volume)))
        }
        None => Ok((value.to_string(), None)),
    }
}

/// Minutes, limited to the durations the timer offers.
fn parse_timer(value: &str) -> Result<u32, String> {
    let minutes = parse_number(value, "--timer")?;
    if DURATION_OPTIONS.contains(&minutes) {
        return Ok(minutes);
    }
    let choices: Vec<String> = DURATION_OPTIONS.iter().map(u32::to_string).collect();
    Err(format!(
        "Unsupported timer length {minutes}; choose one of {}",
        choices.join(", ")
    ))
}

fn parse_number(value: &str, flag: &str) -> Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid number for {flag}: {value}"))
}

fn print_help() {
    println!("Usage: harmoni [options]");
    println!();
    println!("Options:");
    println!("  --list                 List available sounds");
    println!("  --devices              List audio hosts and output devices");
    println!("  --play <id[=volume]>   Play a sound (repeatable), volume 0.0-1.0");
    println!("  --mix <token|url>      Import and play a shared mix");
    println!("  --timer <minutes>      Sleep timer: 5, 15, 30, 45, 60, 90 or 120 minutes");
    println!("  --fade <seconds>       Fade-out length for the timer (0 stops at once)");
    println!("  --share                Print a share link for what is playing");
    println!("  --sounds-dir <dir>     Directory that /sounds/... paths resolve against");
    println!("  --dry-run              Run against a simulated output, without waiting");
    println!("  -v, --verbose          Debug logging");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_repeatable_play_flags() {
        let options = parse_args(args(&["--play", "rain=0.7", "--play", "cafe", "--timer", "15"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            options.plays,
            vec![("rain".to_string(), Some(0.7)), ("cafe".to_string(), None)]
        );
        assert_eq!(options.timer_minutes, Some(15));
    }

    #[test]
    fn rejects_unknown_and_incomplete_flags() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["--timer"])).is_err());
        assert!(parse_args(args(&["--play", "rain=loud"])).is_err());
        assert!(parse_args(args(&["--timer", "7"])).is_err());
    }

    #[test]
    fn share_links_accept_tokens_and_urls() {
        let url = share_link("https://harmoni.app", "abc_-").unwrap();
        assert_eq!(url.as_str(), "https://harmoni.app/?mix=abc_-");
        let url = share_link("https://harmoni.app", "https://other.example/?mix=xyz").unwrap();
        assert_eq!(url.host_str(), Some("other.example"));
    }
}
