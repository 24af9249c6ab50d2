use std::{
    io::{self, stdin, Write},
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

use clap::{ArgAction, Args, Parser, Subcommand};
use cogdrill::{
    config::{ConfigStore, FileConfigStore, SessionConfig, StopCondition},
    error::{ConfigError, SessionError},
    games::GameKind,
    history::HistoryLog,
    keymap::{KeyAction, KeyMap},
    logging::{init_logging, LogFormat},
    player::{PlayerProfile, SyntheticPlayer},
    runtime::{CrosstermEventSource, EngineEventSource, FixedTicker, InputEvent, Runner},
    scheduler::{Clock, ManualClock, Millis, MonotonicClock},
    session::{SessionController, SessionResult},
    telemetry::{JsonlObserver, TracingObserver},
    ui::{PlayView, ResultView},
};
use crossterm::{
    event::{KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info, warn};

const TICK_RATE_MS: u64 = 25;

/// adaptive cognitive-training drills with staircase difficulty
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Adaptive cognitive-training drills (N-Back, Focus-Switch, Digit Span, Reaction Time, Stroop, Visual Search, RSVP, Memory Matrix) with a staircase that follows your performance, phase timing and per-session analytics."
)]
struct Cli {
    /// more logging (-v info, -vv debug, -vvv trace); COGDRILL_LOG overrides
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// log line format on stderr
    #[clap(long, value_enum, default_value_t = LogFormat::Human, global = true)]
    log_format: LogFormat,

    /// directory holding saved presets
    #[clap(long, global = true)]
    config_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// run a whole session with a synthetic player and print the result as JSON
    Simulate(SimulateArgs),
    /// play a session in the terminal
    Play {
        #[clap(short, long, value_enum)]
        game: GameKind,
    },
    /// print or store game presets
    Preset {
        #[clap(subcommand)]
        action: PresetAction,
    },
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[clap(short, long, value_enum)]
    game: GameKind,

    /// seed for trial generation; the player uses seed + 1
    #[clap(long, default_value_t = 0)]
    seed: u64,

    /// chance the player answers correctly
    #[clap(long)]
    accuracy: Option<f64>,

    /// stop after this many trials
    #[clap(long, conflicts_with = "duration_ms")]
    trials: Option<u32>,

    /// stop after this much session time
    #[clap(long)]
    duration_ms: Option<u64>,

    /// stream engine events to stderr as JSON lines
    #[clap(long)]
    events: bool,
}

#[derive(Subcommand, Debug)]
enum PresetAction {
    /// print the preset that would be used, as JSON
    Show {
        #[clap(short, long, value_enum)]
        game: GameKind,
    },
    /// write the preset to the config dir so it can be edited
    Save {
        #[clap(short, long, value_enum)]
        game: GameKind,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stdin must be a tty")]
    NotATty,
    #[error("session stopped without a result")]
    Unfinished,
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) | CliError::Session(SessionError::Config(_)) => 2,
            CliError::NotATty => 3,
            _ => 1,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "cogdrill failed");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let store = match &cli.config_dir {
        Some(dir) => FileConfigStore::with_dir(dir),
        None => FileConfigStore::new(),
    };
    match cli.command {
        Command::Simulate(args) => {
            let result = simulate(&args, &store)?;
            let mut out = io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &result)?;
            writeln!(out)?;
        }
        Command::Play { game } => play(game, &store)?,
        Command::Preset { action } => match action {
            PresetAction::Show { game } => {
                let mut out = io::stdout().lock();
                serde_json::to_writer_pretty(&mut out, &store.load(game))?;
                writeln!(out)?;
            }
            PresetAction::Save { game } => {
                let config = store.load(game);
                config.validate()?;
                let path = store.save(&config)?;
                println!("{}", path.display());
            }
        },
    }
    Ok(())
}

fn simulate(args: &SimulateArgs, store: &dyn ConfigStore) -> Result<SessionResult, CliError> {
    let mut config = store.load(args.game);
    if let Some(trials) = args.trials {
        config.stop = StopCondition::Trials(trials);
    }
    if let Some(ms) = args.duration_ms {
        config.stop = StopCondition::DurationMs(ms);
    }
    let defaults = PlayerProfile::default();
    let profile = PlayerProfile {
        accuracy: args.accuracy.unwrap_or(defaults.accuracy),
        ..defaults
    };
    let mut player = SyntheticPlayer::new(
        profile,
        ChaCha8Rng::seed_from_u64(args.seed.wrapping_add(1)),
    )?;

    let mut controller = SessionController::seeded(args.seed);
    controller.subscribe(TracingObserver);
    if args.events {
        controller.subscribe(JsonlObserver::stderr());
    }
    let clock = ManualClock::new();
    controller.start(config, clock.now())?;
    player.play(&mut controller, &clock)?;
    controller.into_result().ok_or(CliError::Unfinished)
}

fn play(game: GameKind, store: &dyn ConfigStore) -> Result<(), CliError> {
    if !stdin().is_tty() {
        return Err(CliError::NotATty);
    }
    let config = store.load(game);
    config.validate()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let played = play_sessions(&mut terminal, &runner, &config);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let results = played?;
    let history = HistoryLog::new();
    for result in &results {
        if let Some(history) = &history {
            if let Err(err) = history.record(result) {
                warn!(%err, "could not record session history");
            }
        }
        println!(
            "{}: score {}, level {}, {:.0}% acc",
            result.game,
            result.score,
            result.final_level,
            result.metrics.accuracy * 100.0
        );
    }
    if let Some(best) = history.and_then(|h| h.best_score(game).ok().flatten()) {
        println!("best {game} score: {best}");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitType {
    Retry,
    Quit,
}

/// Run sessions back to back until the player quits
fn play_sessions<B: Backend, E: EngineEventSource>(
    terminal: &mut Terminal<B>,
    runner: &Runner<E>,
    config: &SessionConfig,
) -> Result<Vec<SessionResult>, CliError> {
    let mut results = Vec::new();
    loop {
        let clock = MonotonicClock::new();
        let mut controller = SessionController::seeded(rand::random());
        controller.subscribe(TracingObserver);
        controller.start(config.clone(), clock.now())?;
        let mut keymap = KeyMap::new(config.kind());
        let mut shown_trial = None;

        let exit_type = loop {
            draw(terminal, &controller, &keymap, clock.now())?;

            match runner.step() {
                InputEvent::Tick | InputEvent::Resize => {
                    controller.advance(clock.now())?;
                }
                InputEvent::Key(key) if controller.is_finished() => match key.code {
                    KeyCode::Char('r') => break ExitType::Retry,
                    KeyCode::Esc | KeyCode::Char('q') => break ExitType::Quit,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        break ExitType::Quit
                    }
                    _ => {}
                },
                InputEvent::Key(key) => match keymap.interpret(key) {
                    KeyAction::Quit => {
                        controller.abort(clock.now())?;
                        break ExitType::Quit;
                    }
                    KeyAction::Respond(response) => {
                        controller.respond(clock.now(), response)?;
                    }
                    KeyAction::Edited | KeyAction::Ignored => {}
                },
            }

            let trial = controller.current_trial().map(|t| t.index);
            if trial != shown_trial {
                keymap.reset();
                shown_trial = trial;
            }
        };

        let result = controller.into_result().ok_or(CliError::Unfinished)?;
        info!(game = %result.game, score = result.score, "session finished");
        results.push(result);
        if exit_type == ExitType::Quit {
            return Ok(results);
        }
    }
}

fn draw<B: Backend, R: rand::RngCore>(
    terminal: &mut Terminal<B>,
    controller: &SessionController<R>,
    keymap: &KeyMap,
    now: Millis,
) -> io::Result<()> {
    if let Some(result) = controller.result() {
        let view = ResultView { result };
        terminal.draw(|f| f.render_widget(&view, f.area()))?;
        return Ok(());
    }
    let view = PlayView {
        game: keymap.game(),
        phase: controller.phase(),
        trial: controller.current_trial(),
        in_phase_ms: controller
            .phase_entered_at()
            .map_or(0, |at| now.saturating_sub(at)),
        snapshot: controller.snapshot(now),
        last: controller.last_outcome(),
        keymap,
    };
    terminal.draw(|f| f.render_widget(&view, f.area()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use cogdrill::runtime::ChannelEventSource;
    use cogdrill::trial::Verdict;
    use crossterm::event::KeyEvent;
    use ratatui::backend::TestBackend;
    use std::sync::mpsc;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cogdrill").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_simulate_defaults() {
        let cli = parse(&["simulate", "--game", "n-back"]);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.log_format, LogFormat::Human);
        match cli.command {
            Command::Simulate(args) => {
                assert_eq!(args.game, GameKind::NBack);
                assert_eq!(args.seed, 0);
                assert!(args.trials.is_none());
                assert!(!args.events);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = parse(&["preset", "show", "--game", "stroop", "-vv", "--log-format", "json"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_cli_trials_conflict_with_duration() {
        let err = Cli::try_parse_from([
            "cogdrill",
            "simulate",
            "--game",
            "rsvp",
            "--trials",
            "3",
            "--duration-ms",
            "1000",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_exit_codes() {
        let config = CliError::Config(ConfigError::ZeroResponseWindow);
        assert_eq!(config.exit_code(), 2);
        let nested = CliError::Session(SessionError::Config(ConfigError::ZeroResponseWindow));
        assert_eq!(nested.exit_code(), 2);
        assert_eq!(CliError::NotATty.exit_code(), 3);
        assert_eq!(CliError::Unfinished.exit_code(), 1);
    }

    #[test]
    fn test_simulate_overrides_stop_condition() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::with_dir(dir.path());
        let args = SimulateArgs {
            game: GameKind::Stroop,
            seed: 9,
            accuracy: Some(1.0),
            trials: Some(4),
            duration_ms: None,
            events: false,
        };
        let result = simulate(&args, &store).unwrap();
        assert_eq!(result.outcomes.len(), 4);
    }

    #[test]
    fn test_simulate_rejects_bad_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::with_dir(dir.path());
        let args = SimulateArgs {
            game: GameKind::Stroop,
            seed: 0,
            accuracy: Some(2.0),
            trials: None,
            duration_ms: None,
            events: false,
        };
        let err = simulate(&args, &store).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_play_sessions_quit_aborts() {
        let (tx, rx) = mpsc::channel();
        let runner = Runner::new(
            ChannelEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        tx.send(InputEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)))
            .unwrap();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let config = SessionConfig::preset(GameKind::ReactionTime);

        let results = play_sessions(&mut terminal, &runner, &config).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].partial);
        assert!(results[0]
            .outcomes
            .iter()
            .all(|o| o.verdict != Verdict::Correct));
    }
}
