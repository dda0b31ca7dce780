//! VectorInk journal player
//!
//! Replays the forward steps of a record journal onto its starting document
//! and writes the result as a `.vg` document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use vectorink_core::record::RecordEntry;
use vectorink_core::{FrontBuffers, Playing, RecordError, RecordShapes, StorageError};

/// Replay a VectorInk record journal into a document file
#[derive(Parser, Debug)]
#[command(name = "vectorink-player")]
#[command(version, about, long_about = None)]
struct Args {
    /// Journal directory written by a recording session
    #[arg(value_name = "DIR")]
    journal: PathBuf,

    /// Document file to write
    #[arg(short, long, value_name = "FILE", required_unless_present = "list")]
    output: Option<PathBuf>,

    /// Stop after this many steps
    #[arg(long)]
    steps: Option<usize>,

    /// Start from this document instead of the journal's `0.vg` (for undo journals)
    #[arg(long, value_name = "FILE")]
    base: Option<PathBuf>,

    /// Pretty-print the written document
    #[arg(long)]
    pretty: bool,

    /// Print the records index and exit
    #[arg(long)]
    list: bool,
}

/// Result of a replay.
#[derive(Debug, PartialEq, Eq)]
struct Summary {
    steps: usize,
    shapes: usize,
    last_tick: i64,
}

fn play(args: &Args, output: &Path) -> Result<Summary> {
    let base = args
        .base
        .clone()
        .unwrap_or_else(|| RecordShapes::step_file(&args.journal, false, 0));

    let mut playing = Playing::new();
    playing
        .back_doc_mut()
        .load_from_file(&base)
        .with_context(|| format!("loading {}", base.display()))?;
    playing.submit_back_doc();

    let mut rec = RecordShapes::new(&args.journal, None, false, 0);
    let limit = args.steps.unwrap_or(usize::MAX);
    let mut steps = 0;
    while steps < limit && !playing.is_stopping() {
        match playing.play_frame(&mut rec) {
            Ok(applied) => {
                steps += 1;
                log::debug!("Step {} at {}ms: result={}", steps, rec.file_tick(), applied.result);
            }
            Err(RecordError::Storage(StorageError::NotFound(_))) => break,
            Err(e) => return Err(e).with_context(|| format!("playing step {}", steps + 1)),
        }
    }

    let front = playing.front().acquire_front_doc();
    front
        .save_to_file(output, args.pretty)
        .with_context(|| format!("writing {}", output.display()))?;
    let summary = Summary {
        steps,
        shapes: front.shape_count(),
        last_tick: rec.file_tick(),
    };
    FrontBuffers::release_doc(front);
    Ok(summary)
}

fn print_index(entries: &[RecordEntry]) {
    println!("{:>6} {:>10} {:>6}", "step", "tick(ms)", "flags");
    for entry in entries {
        println!("{:>6} {:>10} {:>6}", entry.index, entry.tick, entry.flags);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        let entries = RecordShapes::load_index(&args.journal)
            .with_context(|| format!("reading index of {}", args.journal.display()))?;
        print_index(&entries);
        return Ok(());
    }

    let output = args.output.clone().context("missing --output")?;
    let summary = play(&args, &output)?;
    log::info!(
        "Played {} steps up to {}ms, {} shapes written to {}",
        summary.steps,
        summary.last_tick,
        summary.shapes,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;
    use vectorink_core::ShapeDoc;
    use vectorink_core::shapes::{BaseRect, RectKind, Shape, ShapeKind};

    fn rect_doc(count: usize) -> ShapeDoc {
        let mut doc = ShapeDoc::new();
        for i in 0..count {
            let x = i as f64 * 20.0;
            let rect = BaseRect::from_rect(RectKind::Rect, Rect::new(x, 0.0, x + 10.0, 10.0));
            doc.shapes_mut().add_shape(&Shape::new(ShapeKind::Rect(rect)));
        }
        doc
    }

    fn args(journal: PathBuf, steps: Option<usize>) -> Args {
        Args {
            journal,
            output: None,
            steps,
            base: None,
            pretty: false,
            list: false,
        }
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["vectorink-player", "rec", "-o", "out.vg", "--steps", "3"]).unwrap();
        assert_eq!(args.journal, PathBuf::from("rec"));
        assert_eq!(args.output, Some(PathBuf::from("out.vg")));
        assert_eq!(args.steps, Some(3));
        assert!(Args::try_parse_from(["vectorink-player", "rec"]).is_err());
        assert!(Args::try_parse_from(["vectorink-player", "rec", "--list"]).is_ok());
    }

    #[test]
    fn test_play_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("rec");
        std::fs::create_dir_all(&journal).unwrap();

        let start = ShapeDoc::new();
        start.save_to_file(&RecordShapes::step_file(&journal, false, 0), false).unwrap();
        let mut rec = RecordShapes::new(&journal, Some(&start), false, 0);
        for (n, tick) in [(1, 100), (2, 250), (3, 400)] {
            let doc = rect_doc(n);
            assert!(rec.record_step(tick, n as i64, &doc, None).unwrap());
        }
        rec.stop();
        drop(rec);

        let output = dir.path().join("out.vg");
        let summary = play(&args(journal.clone(), None), &output).unwrap();
        assert_eq!(summary, Summary { steps: 3, shapes: 3, last_tick: 400 });
        assert!(output.exists());

        let summary = play(&args(journal, Some(1)), &output).unwrap();
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.shapes, 1);
    }

    #[test]
    fn test_missing_base_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.vg");
        assert!(play(&args(dir.path().to_path_buf(), None), &output).is_err());
        assert!(!output.exists());
    }
}
