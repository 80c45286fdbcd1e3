//! Shared helpers for the phase-level tests.
//!
//! [`FakeRunner`] stands in for the external tools: it records every
//! invocation and writes the files the real program would have written,
//! so whole phases run without any binaries installed.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use pixelwash::{
    Converter, ConverterConfig, ConverterConfigBuilder, ProgressEvent, ProgressReporter,
    SandboxPaths, Tool, ToolInvocation, ToolOutcome, ToolOutput, ToolRunner,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

// ── Fake tools ───────────────────────────────────────────────────────────────

/// How a scripted call should misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    TimedOut,
    Exit(i32),
    /// Exit 0 without writing anything.
    NoOutput,
}

#[derive(Default)]
struct State {
    calls: Vec<ToolInvocation>,
    per_tool: HashMap<Tool, usize>,
}

pub struct FakeRunner {
    pages: usize,
    width: u32,
    height: u32,
    /// `(tool, nth call of that tool or every call, script)`
    scripts: Vec<(Tool, Option<usize>, Script)>,
    state: Mutex<State>,
}

impl FakeRunner {
    /// `pdftk` will burst every document into `pages` pages.
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            width: 8,
            height: 6,
            scripts: Vec::new(),
            state: Mutex::new(State::default()),
        }
    }

    /// Size of the PNGs `pdftocairo` produces.
    pub fn page_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Script every call of `tool`.
    pub fn script(mut self, tool: Tool, script: Script) -> Self {
        self.scripts.push((tool, None, script));
        self
    }

    /// Script only the `nth` (1-based) call of `tool`.
    pub fn script_nth(mut self, tool: Tool, nth: usize, script: Script) -> Self {
        self.scripts.push((tool, Some(nth), script));
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, tool: Tool) -> Vec<ToolInvocation> {
        self.calls().into_iter().filter(|c| c.tool == tool).collect()
    }

    fn scripted(&self, tool: Tool, nth: usize) -> Option<Script> {
        self.scripts
            .iter()
            .find(|(t, n, _)| *t == tool && n.map_or(true, |n| n == nth))
            .map(|(_, _, s)| *s)
    }

    fn simulate(&self, invocation: &ToolInvocation) {
        let args = invocation.args_lossy();
        match invocation.tool {
            Tool::LibreOffice => {
                // --headless --convert-to pdf:<filter> --outdir <work> <input>
                let work = Path::new(&args[4]);
                let stem = Path::new(&args[5]).file_stem().unwrap().to_owned();
                let mut name = stem;
                name.push(".pdf");
                write_fake_pdf(&work.join(name));
            }
            Tool::GraphicsMagick => {
                let last = args.last().unwrap();
                if let Some(rgb) = last.strip_prefix("rgb:") {
                    // convert <png> -depth 8 rgb:<rgb>
                    let (w, h) = image::image_dimensions(&args[1]).unwrap();
                    std::fs::write(rgb, vec![0u8; (w * h * 3) as usize]).unwrap();
                } else if let Some((_, out)) = last.split_once(':') {
                    // convert -size WxH -depth 8 rgb:<rgb> {pdf,png}:<out>
                    std::fs::write(out, b"rebuilt page").unwrap();
                } else {
                    // convert <image> <pdf>
                    write_fake_pdf(Path::new(last));
                }
            }
            Tool::Pdftk => {
                // <pdf> burst output <work>/page-%d.pdf
                for page in 1..=self.pages {
                    write_fake_pdf(Path::new(&args[3].replace("%d", &page.to_string())));
                }
            }
            Tool::Pdftocairo => {
                // <page.pdf> -png -singlefile <base>
                let png = format!("{}.png", args[3]);
                RgbImage::from_pixel(self.width, self.height, Rgb([255, 255, 255]))
                    .save(png)
                    .unwrap();
            }
            Tool::Tesseract => {
                // <png> <base> -l <lang> --dpi N pdf
                write_fake_pdf(Path::new(&format!("{}.pdf", args[1])));
            }
            Tool::Pdfunite => write_fake_pdf(Path::new(args.last().unwrap())),
            Tool::Ps2pdf => write_fake_pdf(Path::new(&args[1])),
        }
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutcome> {
        let nth = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(invocation.clone());
            let n = state.per_tool.entry(invocation.tool).or_insert(0);
            *n += 1;
            *n
        };
        match self.scripted(invocation.tool, nth) {
            Some(Script::TimedOut) => Ok(ToolOutcome::TimedOut),
            Some(Script::Exit(code)) => Ok(ToolOutcome::Completed(ToolOutput::exited(code))),
            Some(Script::NoOutput) => Ok(ToolOutcome::Completed(ToolOutput::success())),
            None => {
                self.simulate(invocation);
                Ok(ToolOutcome::Completed(ToolOutput::success()))
            }
        }
    }
}

fn write_fake_pdf(path: &Path) {
    std::fs::write(path, b"%PDF-1.4\n%fake\n").unwrap();
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn percentages(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.percentage).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.text).collect()
    }

    pub fn failures(&self) -> Vec<ProgressEvent> {
        self.events().into_iter().filter(|e| e.error).collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Sandbox fixture ──────────────────────────────────────────────────────────

/// A throwaway directory tree laid out like the real sandbox.
pub struct Sandbox {
    _root: TempDir,
    pub paths: SandboxPaths,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let paths = SandboxPaths::under(root.path());
        Self { _root: root, paths }
    }

    pub fn builder(&self) -> ConverterConfigBuilder {
        ConverterConfig::builder().paths(self.paths.clone())
    }

    pub fn config(&self) -> ConverterConfig {
        self.builder().build().unwrap()
    }

    pub fn write_input(&self, bytes: &[u8]) {
        std::fs::write(&self.paths.input_file, bytes).unwrap();
    }

    pub fn write_pdf_input(&self) {
        self.write_input(b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n");
    }

    pub fn write_text_input(&self) {
        self.write_input(b"just some notes\nnothing to render here\n");
    }

    /// A minimal `.docx`: the members the classifier looks at, nothing more.
    pub fn write_docx_input(&self) {
        let mut zip = ZipWriter::new(File::create(&self.paths.input_file).unwrap());
        let opts = FileOptions::default();
        zip.start_file("[Content_Types].xml", opts).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file("word/document.xml", opts).unwrap();
        zip.write_all(b"<w:document/>").unwrap();
        zip.finish().unwrap();
    }

    /// Pre-populate the handoff area as phase 1 would.
    pub fn stage_pixels(&self, pages: usize, width: u32, height: u32) {
        let dir = &self.paths.pixels_dir;
        std::fs::create_dir_all(dir).unwrap();
        for page in 1..=pages {
            std::fs::write(
                dir.join(format!("page-{page}.rgb")),
                vec![0x80u8; (width * height * 3) as usize],
            )
            .unwrap();
            std::fs::write(dir.join(format!("page-{page}.width")), width.to_string()).unwrap();
            std::fs::write(dir.join(format!("page-{page}.height")), height.to_string()).unwrap();
        }
    }

    pub fn work(&self, name: &str) -> PathBuf {
        self.paths.work_dir.join(name)
    }

    pub fn pixels(&self, name: &str) -> PathBuf {
        self.paths.pixels_dir.join(name)
    }

    pub fn safe(&self, name: &str) -> PathBuf {
        self.paths.safe_dir.join(name)
    }
}

pub fn converter(
    config: ConverterConfig,
    runner: &Arc<FakeRunner>,
    reporter: &Arc<RecordingReporter>,
) -> Converter {
    Converter::new(config, runner.clone(), reporter.clone())
}

/// Route library logs through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("pixelwash=debug")
        .try_init();
}
