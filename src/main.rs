use std::io::{self, BufRead};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use transfer_cam::config::{Config, DisplayKind};
use transfer_cam::display::impl_console::StatusDisplayConsole;
use transfer_cam::display::impl_fake::StatusDisplayFake;
use transfer_cam::display::impl_gui::StatusDisplayGui;
use transfer_cam::display::interface::StatusDisplay;
use transfer_cam::feature_extractor::impl_pooling::FeatureExtractorPooling;
use transfer_cam::feature_extractor::impl_tract_onnx::FeatureExtractorTractOnnx;
use transfer_cam::feature_extractor::interface::FeatureExtractor;
use transfer_cam::frame_source::impl_fake::{FakeScene, FrameSourceFake};
use transfer_cam::frame_source::impl_image_files::FrameSourceImageFiles;
use transfer_cam::frame_source::interface::FrameSource;
use transfer_cam::host::{self, HostCommand};
use transfer_cam::library::logger::impl_console::LoggerConsole;
use transfer_cam::library::logger::interface::Logger;
use transfer_cam::session::main::Session;
use transfer_cam::session::render::status_lines;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    let logger: Arc<dyn Logger + Send + Sync> =
        Arc::new(LoggerConsole::new(config.logger_timezone));

    let feature_extractor: Box<dyn FeatureExtractor> = match &config.model {
        Some(model) => Box::new(FeatureExtractorTractOnnx::new(model.clone(), logger.clone())?),
        None => Box::new(FeatureExtractorPooling::new(
            config.frame_size,
            config.pooling_grid,
        )?),
    };
    let input_size = feature_extractor.input_size();

    let (frame_source, scene): (Box<dyn FrameSource>, Option<FakeScene>) = match &config.frames_dir {
        Some(dir) => (
            Box::new(FrameSourceImageFiles::new(
                logger.clone(),
                dir.clone(),
                input_size,
                config.resize_policy,
            )),
            None,
        ),
        None => {
            let fake = FrameSourceFake::new(logger.clone(), input_size, config.fake_frame_noise);
            let scene = fake.scene();
            (Box::new(fake), Some(scene))
        }
    };

    let display: Box<dyn StatusDisplay> = match config.display {
        DisplayKind::Console => Box::new(StatusDisplayConsole::new()),
        DisplayKind::Gui => Box::new(StatusDisplayGui::new()),
        DisplayKind::None => Box::new(StatusDisplayFake::new()),
    };

    let mut session = Session::new(
        config.clone(),
        logger.clone(),
        frame_source,
        feature_extractor,
        display,
    );

    session.start()?;

    let _ = logger.info(host::HELP);
    let lines = spawn_stdin_reader();
    let mut input_open = true;

    loop {
        match lines.try_recv() {
            Ok(line) => {
                if !apply(&mut session, &config, logger.as_ref(), scene.as_ref(), &line) {
                    break;
                }
                continue;
            }
            Err(TryRecvError::Disconnected) => input_open = false,
            Err(TryRecvError::Empty) => {}
        }

        if session.step() {
            continue;
        }

        if !input_open {
            break;
        }

        match lines.recv_timeout(config.idle_poll) {
            Ok(line) => {
                if !apply(&mut session, &config, logger.as_ref(), scene.as_ref(), &line) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                input_open = false;
                // loops never go idle on their own
                session.stop_recording();
                if session.is_predicting() {
                    let _ = session.toggle_predict();
                }
            }
        }
    }

    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    receiver
}

/// Runs one host command. Returns false on quit.
fn apply(
    session: &mut Session,
    config: &Config,
    logger: &dyn Logger,
    scene: Option<&FakeScene>,
    line: &str,
) -> bool {
    if line.trim().is_empty() {
        return true;
    }

    let command = match host::parse(line) {
        Ok(command) => command,
        Err(message) => {
            let _ = logger.error(&message);
            return true;
        }
    };

    // rejected requests are logged by the session
    match command {
        HostCommand::AddLabel(name) => {
            let _ = session.add_label(&name);
        }
        HostCommand::Record(label) => {
            let _ = session.start_recording(label);
        }
        HostCommand::Stop => session.stop_recording(),
        HostCommand::RecordImage { path, label } => {
            let _ = session.record_image(path, label);
        }
        HostCommand::Train { epochs } => {
            let mut options = config.train_options;
            if let Some(epochs) = epochs {
                options.epochs = epochs;
            }
            let _ = session.train(options);
        }
        HostCommand::Predict => {
            let _ = session.toggle_predict();
        }
        HostCommand::Status => {
            let state = session.state();
            for line in status_lines(state).iter().filter(|line| !line.is_empty()) {
                let _ = logger.info(line);
            }
            if let Some(error) = &state.last_error {
                let _ = logger.info(&format!("Last error: {}", error));
            }
        }
        HostCommand::Scene(rgb) => match scene {
            Some(scene) => scene.set(rgb),
            None => {
                let _ = logger.error("scene only applies to the synthetic camera");
            }
        },
        HostCommand::Quit => return false,
    }

    true
}
