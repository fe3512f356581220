//! Interactive lab session: reads commands from stdin and drives the wizard.

use crate::render;
use anyhow::{Context, Result};
use facelab_core::{capture_file, InferenceBackend, LabStep, Wizard, WizardError};
use std::future::Future;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const BUSY_TICK: Duration = Duration::from_millis(500);

const HELP: &str = "\
命令：
  start              开始探究任务（实验介绍 → 人脸识别）
  next | n           下一步（需满足当前步骤的前置条件）
  back | b           上一步
  goto <步骤>        直接跳转到任意步骤（1-5 或 INTRO/RECOGNIZE/REMEMBER/UNLOCK/REPORT）
  upload <路径>      上传图片：识别 / 注册 / 验证，取决于当前步骤
  show               重新显示当前步骤
  save [路径]        导出实验报告
  restart            清空实验数据并回到实验介绍
  help               显示本帮助
  quit               退出";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Next,
    Back,
    Goto(LabStep),
    Upload(PathBuf),
    Show,
    Save(Option<PathBuf>),
    Restart,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, arg) = match line.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (line, None),
    };

    let command = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("start", None) => Command::Start,
        ("next" | "n", None) => Command::Next,
        ("back" | "b", None) => Command::Back,
        ("goto" | "g", Some(step)) => Command::Goto(step.parse().map_err(|e| format!("{e}"))?),
        ("upload" | "u", Some(path)) => Command::Upload(PathBuf::from(path)),
        // An upload without a file is the "nothing selected" case.
        ("upload" | "u", None) => Command::Upload(PathBuf::new()),
        ("show" | "s", None) => Command::Show,
        ("save", path) => Command::Save(path.map(PathBuf::from)),
        ("restart", None) => Command::Restart,
        ("help" | "h" | "?", None) => Command::Help,
        ("quit" | "exit" | "q", None) => Command::Quit,
        _ => return Err(format!("无法识别的命令：{line}（输入 help 查看帮助）")),
    };
    Ok(Some(command))
}

pub struct Outcome {
    pub output: String,
    pub quit: bool,
}

impl Outcome {
    fn show(output: String) -> Self {
        Self { output, quit: false }
    }
}

pub struct Session<B> {
    wizard: Wizard<B>,
    report_out: Option<PathBuf>,
}

impl<B: InferenceBackend> Session<B> {
    pub fn new(backend: B, report_out: Option<PathBuf>) -> Self {
        Self {
            wizard: Wizard::new(backend),
            report_out,
        }
    }

    pub fn wizard(&self) -> &Wizard<B> {
        &self.wizard
    }

    /// Apply one command and return what should be printed.
    pub async fn handle(&mut self, command: Command) -> Outcome {
        let nav = match command {
            Command::Start => self.wizard.start().map(|_| ()),
            Command::Next => self.wizard.advance().map(|_| ()),
            Command::Back => self.wizard.back().map(|_| ()),
            Command::Goto(step) => {
                self.wizard.jump(step);
                Ok(())
            }
            Command::Restart => {
                self.wizard.restart();
                Ok(())
            }
            Command::Show => Ok(()),
            Command::Upload(path) => return self.upload(&path).await,
            Command::Save(path) => return Outcome::show(self.save(path.as_deref())),
            Command::Help => return Outcome::show(HELP.to_string()),
            Command::Quit => {
                return Outcome {
                    output: "再见。".into(),
                    quit: true,
                }
            }
        };

        match nav {
            Ok(()) => {
                let mut output = render::step_view(&self.wizard);
                if self.wizard.step() == LabStep::Report {
                    if let Some(path) = self.report_out.clone() {
                        output.push_str(&self.save(Some(&path)));
                    }
                }
                Outcome::show(output)
            }
            Err(e) => Outcome::show(describe_error(&e)),
        }
    }

    async fn upload(&mut self, path: &Path) -> Outcome {
        let step = self.wizard.step();
        if !matches!(step, LabStep::Recognize | LabStep::Remember | LabStep::Unlock) {
            return Outcome::show("当前步骤不需要上传图片。".into());
        }

        let image = match capture_file(path) {
            Ok(Some(image)) => image,
            Ok(None) => return Outcome::show(String::new()),
            Err(e) => return Outcome::show(format!("读取图片失败：{e}")),
        };
        let mut output = format!("已选择 {}\n", image.preview());

        let result = match step {
            LabStep::Recognize => with_busy_indicator(self.wizard.recognize(&image.data_uri))
                .await
                .map(|_| ()),
            LabStep::Remember => with_busy_indicator(self.wizard.enroll(&image.data_uri))
                .await
                .map(|_| ()),
            _ => with_busy_indicator(self.wizard.unlock(&image.data_uri))
                .await
                .map(|_| ()),
        };

        match result {
            Ok(()) => output.push_str(&render::step_view(&self.wizard)),
            Err(e) => output.push_str(&describe_error(&e)),
        }
        Outcome::show(output)
    }

    fn save(&self, path: Option<&Path>) -> String {
        let Some(path) = path.or(self.report_out.as_deref()) else {
            return "请指定报告保存路径：save <路径>".into();
        };
        let report = render::summary_report(
            self.wizard.records(),
            self.wizard.comparison(),
            &self.wizard.session_id().to_string(),
            chrono::Local::now().date_naive(),
        );
        match write_report(path, &report) {
            Ok(()) => format!("\n报告已保存到 {}\n", path.display()),
            Err(e) => format!("\n报告保存失败：{e:#}\n"),
        }
    }
}

fn write_report(path: &Path, report: &str) -> Result<()> {
    std::fs::write(path, report).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}

fn describe_error(e: &WizardError) -> String {
    match e {
        WizardError::Gated { .. } => format!("无法进入下一步：{e}"),
        WizardError::Busy => "正在处理上一张图片，请稍候。".into(),
        WizardError::NotEnrolled => "尚未注册人脸，请先完成注册步骤。".into(),
        _ => e.to_string(),
    }
}

/// Await `fut`, printing a tick to stderr every half second while it runs.
///
/// The future is never cancelled.
async fn with_busy_indicator<F: Future>(fut: F) -> F::Output {
    tokio::pin!(fut);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + BUSY_TICK, BUSY_TICK);
    let mut ticked = false;
    let output = loop {
        tokio::select! {
            out = &mut fut => break out,
            _ = ticker.tick() => {
                if !ticked {
                    eprint!("AI 正在深度分析");
                    ticked = true;
                }
                eprint!(".");
                let _ = std::io::stderr().flush();
            }
        }
    };
    if ticked {
        eprintln!();
    }
    output
}

/// Run the interactive session until `quit` or end of input.
pub async fn run<B: InferenceBackend>(backend: B, report_out: Option<PathBuf>) -> Result<()> {
    let mut session = Session::new(backend, report_out);
    println!("{}", render::step_view(session.wizard()));
    println!("输入 help 查看可用命令。");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("facelab> ");
        std::io::stdout().flush().context("flushing stdout")?;

        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        let outcome = session.handle(command).await;
        if !outcome.output.is_empty() {
            println!("{}", outcome.output);
        }
        if outcome.quit {
            break;
        }
    }
    Ok(())
}
