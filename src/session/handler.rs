//! Command handlers
//!
//! Translates script commands into store updates, tool invocations and
//! assertions. A handler error is recorded against the open test case and
//! the script continues. Only fatal errors are passed up to the run loop.

use chrono::Local;
use colored::Colorize;

use crate::common::{fmt4, paths, Error, Result};
use crate::script::{value, Command, ScriptLine};

use super::config_store::ConfigStore;
use super::Session;

/// Default label for SCREENSHOT without one
const DEFAULT_SHOT_LABEL: &str = "snap";

/// Parse and execute one script line
///
/// Parse errors and handler errors are recorded against the open case.
/// Returns `Err` only for fatal errors.
pub async fn handle_line(session: &mut Session, line: &ScriptLine) -> Result<()> {
    let outcome = match Command::parse(&line.text) {
        Ok(command) => {
            tracing::debug!("line {}: {}", line.number, command.keyword());
            handle_command(session, command).await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            session.record_error(&e, Some(line.number));
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

/// Execute a parsed command
pub async fn handle_command(session: &mut Session, command: Command) -> Result<()> {
    match command {
        // === Structure ===
        Command::Test { id, title } => {
            session.cases.open(&id, &title);
            let rule = "=".repeat(60);
            println!("\n{}", rule);
            println!("{} {} - {}", "Test case:".blue().bold(), id.bold(), title);
            println!("{}", rule);
            Ok(())
        }

        Command::DefVar { name, initial } => {
            let value = match initial {
                Some(token) => value::resolve(&token, &session.variables)?,
                None => 0.0,
            };
            session.variables.define(&name, value)?;
            tracing::info!("Defined {} (initial value: {})", name, value);
            Ok(())
        }

        Command::Config { key, value } => {
            if !ConfigStore::is_known(&key) {
                tracing::warn!("Unrecognized config key {}, storing it anyway", key);
            }
            session.endpoints.set(&key, &value);
            tracing::info!("Config updated: {} = {}", key, value);
            Ok(())
        }

        // === Power supply ===
        Command::PowerOn { voltage, current } => {
            let defaults = session.power_defaults();
            let voltage = voltage.unwrap_or_else(|| defaults.default_voltage.clone());
            let current = current.unwrap_or_else(|| defaults.default_current.clone());
            let invocation = session
                .instruments()
                .power_on(Some((voltage.as_str(), current.as_str())), &session.endpoints);
            session.run_tool(&invocation).await?;
            tracing::info!("Power on: {}V, {}A", voltage, current);
            Ok(())
        }

        Command::PowerOff => power_off(session).await,

        Command::PowerCycle => {
            // A failed power-off is recorded but the cycle still restores output
            if let Err(e) = power_off(session).await {
                if e.is_fatal() {
                    return Err(e);
                }
                session.record_error(&e, None);
            }

            session.interrupt().sleep(session.power_cycle_pause()).await?;

            let invocation = session.instruments().power_on(None, &session.endpoints);
            session.run_tool(&invocation).await?;
            tracing::info!("Power output restored");
            Ok(())
        }

        // === Resistance box ===
        Command::ResSet { value } => {
            let invocation = session
                .instruments()
                .resistance_set(&value, &session.endpoints);
            session.run_tool(&invocation).await?;
            tracing::info!("Resistance set to {}", value);
            Ok(())
        }

        Command::ResOpen => {
            let invocation = session.instruments().resistance_disconnect(&session.endpoints);
            session.run_tool(&invocation).await?;
            tracing::info!("Resistance relay open");
            Ok(())
        }

        Command::ResClose => {
            let invocation = session.instruments().resistance_connect(&session.endpoints);
            session.run_tool(&invocation).await?;
            tracing::info!("Resistance relay closed");
            Ok(())
        }

        // === Oscilloscope ===
        Command::Screenshot { label } => {
            let label = label.unwrap_or_else(|| DEFAULT_SHOT_LABEL.to_string());
            let dir = paths::ensure_dir(&session.screenshot_dir())?;

            let stamp = Local::now().format("%H%M%S");
            let file_name = format!("{}_{}_{}.png", session.cases.current_id(), label, stamp);
            let path = dir.join(&file_name);

            let invocation = session
                .instruments()
                .scope_screenshot(&path, &session.endpoints);
            session.run_tool(&invocation).await?;
            tracing::info!("Screenshot saved: {}", path.display());

            let link = session.screenshot_link(&label, &file_name);
            if let Some(case) = session.cases.current_mut() {
                case.attach(&link);
            }
            Ok(())
        }

        Command::Read { channel, var } => {
            // Checked before touching the scope so a typo costs no measurement
            if !session.variables.contains(&var) {
                return Err(Error::UndefinedVariable(var));
            }

            let invocation = session.instruments().scope_mean(&channel, &session.endpoints);
            let output = session.run_tool(&invocation).await?;
            let value = output.scalar(&invocation.description)?;

            session.variables.set(&var, value)?;
            tracing::info!("Read {} = {:.4} A", var, value);
            Ok(())
        }

        // === Flow ===
        Command::Wait { seconds } => {
            tracing::info!("Waiting {} s...", seconds);
            session
                .interrupt()
                .sleep(std::time::Duration::from_secs_f64(seconds))
                .await
        }

        Command::SetVar { name, value } => {
            if !session.variables.contains(&name) {
                return Err(Error::UndefinedVariable(name));
            }
            let resolved = value::resolve(&value, &session.variables)?;
            session.variables.set(&name, resolved)?;
            tracing::info!("Set {} = {}", name, resolved);
            Ok(())
        }

        // === Assertions ===
        Command::CheckRange {
            actual,
            expected,
            tolerance,
        } => check_range(session, &actual, &expected, &tolerance),

        Command::CheckDiff { a, b, max_diff } => check_diff(session, &a, &b, &max_diff),
    }
}

async fn power_off(session: &mut Session) -> Result<()> {
    let invocation = session.instruments().power_off(&session.endpoints);
    session.run_tool(&invocation).await?;
    tracing::info!("Power off");
    Ok(())
}

/// Pass iff `actual` lies in `[expected - tol, expected + tol]`
///
/// A tolerance ending in `%` is relative to the expected value.
fn check_range(session: &mut Session, actual: &str, expected: &str, tolerance: &str) -> Result<()> {
    let vars = &session.variables;
    let real = value::resolve(actual, vars)?;
    let expect = value::resolve(expected, vars)?;
    let tol = if tolerance.trim().ends_with('%') {
        expect * value::resolve(tolerance, vars)?
    } else {
        value::resolve(tolerance, vars)?
    };

    let lower = expect - tol;
    let upper = expect + tol;
    let range = format!("[{}, {}]", fmt4(lower), fmt4(upper));

    session.cases.record(range.clone(), fmt4(real));

    if lower <= real && real <= upper {
        println!(
            "  {} {}({}) within {}",
            "PASS".green().bold(),
            actual,
            fmt4(real),
            range
        );
    } else {
        let message = format!(
            "{}({}) out of range {} (expected {} ±{})",
            actual,
            fmt4(real),
            range,
            expected,
            tolerance
        );
        println!("  {} {}", "FAIL".red().bold(), message);
        session.cases.record_failure(&format!("FAIL: {}", message));
    }
    Ok(())
}

/// Pass iff `|a - b| <= max_diff`
fn check_diff(session: &mut Session, a: &str, b: &str, max_diff: &str) -> Result<()> {
    let vars = &session.variables;
    let val_a = value::resolve(a, vars)?;
    let val_b = value::resolve(b, vars)?;
    let limit = value::resolve(max_diff, vars)?;

    let diff = (val_a - val_b).abs();
    session
        .cases
        .record(format!("Diff <= {}", fmt4(limit)), fmt4(diff));

    if diff <= limit {
        println!(
            "  {} difference {} <= allowed {}",
            "PASS".green().bold(),
            fmt4(diff),
            fmt4(limit)
        );
    } else {
        let message = format!(
            "difference {} > allowed {} ({} vs {})",
            fmt4(diff),
            fmt4(limit),
            a,
            b
        );
        println!("  {} {}", "FAIL".red().bold(), message);
        session.cases.record_failure(&format!("FAIL: {}", message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::Config;
    use crate::script::Script;
    use crate::session::Verdict;
    use crate::tools::testing::{RecordingRunner, Reply};
    use crate::tools::Interrupt;
    use std::sync::Arc;

    fn session_with(runner: Arc<RecordingRunner>) -> Session {
        let mut config = Config::default();
        config.timing.power_cycle_pause_ms = 1;
        Session::new(&config, runner, Interrupt::never())
    }

    async fn run_source(session: &mut Session, source: &str) {
        for line in Script::from_source(source).lines {
            handle_line(session, &line).await.unwrap();
        }
        session.cases.finalize();
    }

    #[tokio::test]
    async fn test_end_to_end_check_range() {
        let runner = Arc::new(RecordingRunner::new());
        let mut session = session_with(runner);
        run_source(
            &mut session,
            "DEF_VAR $v\nTEST T1 \"t\"\nSET_VAR $v 10\nCHECK_RANGE $v 10 1%\n",
        )
        .await;

        let cases = session.cases.finalized();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, "T1");
        assert_eq!(cases[0].title, "t");
        assert_eq!(cases[0].result, Verdict::Pass);
        assert_eq!(cases[0].expected, vec!["[9.9000, 10.1000]"]);
        assert_eq!(cases[0].actual, vec!["10.0000"]);
    }

    #[tokio::test]
    async fn test_check_range_percent_bounds() {
        let mut session = session_with(Arc::new(RecordingRunner::new()));
        run_source(
            &mut session,
            "TEST A pass\nCHECK_RANGE 2580 2560 5%\nTEST B fail\nCHECK_RANGE 2800 2560 5%\n",
        )
        .await;

        let cases = session.cases.finalized();
        assert_eq!(cases[0].result, Verdict::Pass);
        assert_eq!(cases[0].expected, vec!["[2432.0000, 2688.0000]"]);
        assert_eq!(cases[1].result, Verdict::Fail);
        assert!(cases[1].note.contains("out of range"));
    }

    #[tokio::test]
    async fn test_absolute_tolerance_and_units() {
        let mut session = session_with(Arc::new(RecordingRunner::new()));
        run_source(&mut session, "TEST A abs\nCHECK_RANGE 2.6 2560mA 50mA\n").await;
        let case = &session.cases.finalized()[0];
        assert_eq!(case.result, Verdict::Pass);
        assert_eq!(case.expected, vec!["[2.5100, 2.6100]"]);
    }

    #[tokio::test]
    async fn test_failed_diff_does_not_stop_case() {
        let mut session = session_with(Arc::new(RecordingRunner::new()));
        run_source(
            &mut session,
            "TEST T1 diff\nCHECK_DIFF 1.0 1.5 0.1\nCHECK_RANGE 5 5 1%\n",
        )
        .await;

        let case = &session.cases.finalized()[0];
        assert_eq!(case.result, Verdict::Fail);
        assert_eq!(case.expected, vec!["Diff <= 0.1000", "[4.9500, 5.0500]"]);
        assert_eq!(case.actual, vec!["0.5000", "5.0000"]);
    }

    #[tokio::test]
    async fn test_set_var_before_def_var_fails_without_creating() {
        let mut session = session_with(Arc::new(RecordingRunner::new()));
        run_source(&mut session, "TEST T1 vars\nSET_VAR $x 1\n").await;

        assert!(!session.variables.contains("$x"));
        let case = &session.cases.finalized()[0];
        assert_eq!(case.result, Verdict::Fail);
        assert!(case.note.contains("Undefined variable: $x"));
    }

    #[tokio::test]
    async fn test_def_var_overwrites() {
        let mut session = session_with(Arc::new(RecordingRunner::new()));
        run_source(&mut session, "DEF_VAR $x 1\nDEF_VAR $x 2\n").await;
        assert_eq!(session.variables.get("$x").unwrap(), 2.0);
        assert!(!session.cases.has_failures());
    }

    #[tokio::test]
    async fn test_read_stores_value() {
        let runner = Arc::new(RecordingRunner::new().on("mean", Reply::Stdout("0.1234\n".into())));
        let mut session = session_with(runner.clone());
        run_source(
            &mut session,
            "CONFIG scope_ip 10.0.0.9\nDEF_VAR $i\nTEST T1 read\nREAD CH2 TO $i\n",
        )
        .await;

        assert_eq!(session.variables.get("$i").unwrap(), 0.1234);
        let reads = runner.calls_with("mean");
        assert_eq!(reads.len(), 1);
        assert!(reads[0].has_arg("2"));
        assert!(reads[0].has_arg("10.0.0.9"));
        assert_eq!(session.cases.finalized()[0].result, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_read_failure_leaves_variable_unchanged() {
        let runner = Arc::new(
            RecordingRunner::new()
                .once("mean", Reply::Stdout("overload".into()))
                .once("mean", Reply::Fail("scope offline".into())),
        );
        let mut session = session_with(runner);
        run_source(
            &mut session,
            "DEF_VAR $i 0.5\nTEST T1 read\nREAD CH1 TO $i\nREAD CH1 TO $i\n",
        )
        .await;

        assert_eq!(session.variables.get("$i").unwrap(), 0.5);
        let case = &session.cases.finalized()[0];
        assert_eq!(case.result, Verdict::Fail);
        assert!(case.note.contains("non-numeric"));
        assert!(case.note.contains("scope offline"));
    }

    #[tokio::test]
    async fn test_read_undefined_variable_skips_tool() {
        let runner = Arc::new(RecordingRunner::new());
        let mut session = session_with(runner.clone());
        run_source(&mut session, "TEST T1 read\nREAD CH1 TO $nope\n").await;
        assert!(runner.calls().is_empty());
        assert_eq!(session.cases.finalized()[0].result, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_power_commands() {
        let runner = Arc::new(RecordingRunner::new());
        let mut session = session_with(runner.clone());
        run_source(
            &mut session,
            "CONFIG POWER_ADDR USB0::7\nPOWER_ON\nPOWER_ON 5 1\nPOWER_CYCLE\nPOWER_OFF\n",
        )
        .await;

        let calls = runner.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(
            calls[0].args[1..],
            ["-v", "12.0", "-c", "2.0", "-o", "on", "-a", "USB0::7"]
        );
        assert_eq!(calls[1].args[1..5], ["-v", "5", "-c", "1"]);
        // cycle: off, then on without setpoints
        assert_eq!(calls[2].args[1..3], ["-o", "off"]);
        assert_eq!(calls[3].args[1..], ["-o", "on", "-a", "USB0::7"]);
        assert_eq!(calls[4].args[1..3], ["-o", "off"]);
    }

    #[tokio::test]
    async fn test_power_cycle_restores_output_after_failed_off() {
        let runner = Arc::new(RecordingRunner::new().once("off", Reply::Fail("busy".into())));
        let mut session = session_with(runner.clone());
        run_source(&mut session, "TEST T1 cycle\nPOWER_CYCLE\n").await;

        assert_eq!(runner.calls_with("on").len(), 1);
        assert_eq!(session.cases.finalized()[0].result, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_tool_failure_is_recorded_and_run_continues() {
        let runner = Arc::new(RecordingRunner::new().on("connect", Reply::SpawnError("not found".into())));
        let mut session = session_with(runner.clone());
        run_source(&mut session, "TEST T1 res\nRES_SET 100\nRES_OPEN\n").await;

        assert_eq!(runner.calls().len(), 2);
        let case = &session.cases.finalized()[0];
        assert_eq!(case.result, Verdict::Fail);
        assert!(case.note.contains("set resistance 100"));
    }

    #[tokio::test]
    async fn test_unknown_command_is_recorded() {
        let mut session = session_with(Arc::new(RecordingRunner::new()));
        run_source(&mut session, "TEST T1 x\nJUMP 3\nCHECK_RANGE 1 1 0\n").await;
        let case = &session.cases.finalized()[0];
        assert_eq!(case.result, Verdict::Fail);
        assert!(case.note.contains("Unknown command: JUMP"));
        assert_eq!(case.expected.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_operands_are_recorded_and_run_continues() {
        let runner = Arc::new(RecordingRunner::new());
        let mut session = session_with(runner.clone());
        run_source(
            &mut session,
            "TEST T1 operands\nCONFIG RES_PORT\nCHECK_RANGE abc 1 5%\nCHECK_DIFF $undef 1 0.1\nCHECK_RANGE 1 1 0\nRES_OPEN\n",
        )
        .await;

        let case = &session.cases.finalized()[0];
        assert_eq!(case.result, Verdict::Fail);
        assert!(case.note.contains("CONFIG: wrong arguments"));
        assert!(case.note.contains("Cannot parse value 'abc'"));
        assert!(case.note.contains("Undefined variable: $undef"));
        // only the valid assertion produced a row
        assert_eq!(case.expected, vec!["[1.0000, 1.0000]"]);
        assert_eq!(case.actual, vec!["1.0000"]);
        assert_eq!(session.endpoints.get("RES_PORT"), None);
        assert_eq!(runner.calls_with("disconnect").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_screenshot_marks_fail_without_link() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.report.output_dir = tmp.path().to_path_buf();
        let runner = Arc::new(RecordingRunner::new().on("shot", Reply::Fail("scope offline".into())));
        let mut session = Session::new(&config, runner.clone(), Interrupt::never());

        run_source(&mut session, "TEST T1 shot\nSCREENSHOT ripple\nCHECK_RANGE 1 1 0\n").await;

        let case = &session.cases.finalized()[0];
        assert_eq!(case.result, Verdict::Fail);
        assert!(case.note.contains("scope offline"));
        assert!(!case.note.contains("!["));
        assert_eq!(case.expected.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_wait_is_fatal() {
        let mut session = session_with(Arc::new(RecordingRunner::new()));
        let line = Script::from_source("WAIT later").lines.remove(0);
        let err = handle_line(&mut session, &line).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDuration(_)));
    }

    #[tokio::test]
    async fn test_screenshot_links_into_note() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.report.output_dir = tmp.path().to_path_buf();
        let runner = Arc::new(RecordingRunner::new());
        let mut session = Session::new(&config, runner.clone(), Interrupt::never());

        run_source(&mut session, "TEST Case_01 shot\nSCREENSHOT ripple\n").await;

        assert!(tmp.path().join("screen_shot").is_dir());
        let shot = &runner.calls_with("shot")[0];
        let file = &shot.args[3];
        assert!(file.contains("Case_01_ripple_"));
        assert!(file.ends_with(".png"));

        let note = &session.cases.finalized()[0].note;
        assert!(note.starts_with("![ripple](screen_shot/Case_01_ripple_"));
    }
}
