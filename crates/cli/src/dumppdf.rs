//! dumppdf - dump PDF internal structure as XML
//!
//! Without selection flags the trailer is printed. `--commands` prints the
//! interpreted drawing commands of the selected pages as JSON lines instead.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, ArgGroup, Parser};
use memmap2::Mmap;
use quire_core::document::{Document, XrefEntry};
use quire_core::interp::{CommandList, StepBudget};
use quire_core::model::{Dictionary, ObjectId, PdfObject};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Escape bytes for XML text and attribute values.
fn escape(s: &[u8]) -> String {
    let mut result = String::with_capacity(s.len());
    for &byte in s {
        match byte {
            b'&' => result.push_str("&amp;"),
            b'<' => result.push_str("&lt;"),
            b'>' => result.push_str("&gt;"),
            b'"' => result.push_str("&quot;"),
            b'\'' => result.push_str("&#39;"),
            0..=31 | 127..=255 => result.push_str(&format!("&#{byte};")),
            _ => result.push(byte as char),
        }
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamCodec {
    /// Stream dictionary only.
    None,
    /// Undecoded payload written as is.
    Raw,
    /// Decoded payload written as is.
    Binary,
    /// Decoded payload escaped into the XML.
    Text,
}

/// Dictionary entries in key order, so output is stable between runs.
fn sorted(dict: &Dictionary) -> Vec<(&[u8], &PdfObject)> {
    let mut entries: Vec<_> = dict.iter().map(|(k, v)| (k.as_bytes(), v)).collect();
    entries.sort_unstable_by_key(|(k, _)| *k);
    entries
}

fn dumpxml<W: Write>(out: &mut W, doc: &Document, obj: &PdfObject, codec: StreamCodec) -> Result<()> {
    match obj {
        PdfObject::Null => write!(out, "<null />")?,
        PdfObject::Bool(b) => write!(out, "<boolean>{b}</boolean>")?,
        PdfObject::Int(n) => write!(out, "<number>{n}</number>")?,
        PdfObject::Real(n) => write!(out, "<number>{n}</number>")?,
        PdfObject::String(s) => write!(out, r#"<string size="{}">{}</string>"#, s.len(), escape(s))?,
        PdfObject::Name(name) => write!(out, "<literal>{}</literal>", escape(name.as_bytes()))?,
        PdfObject::Array(items) => {
            writeln!(out, r#"<list size="{}">"#, items.len())?;
            for item in items {
                dumpxml(out, doc, item, codec)?;
                writeln!(out)?;
            }
            write!(out, "</list>")?;
        }
        PdfObject::Dict(dict) => {
            writeln!(out, r#"<dict size="{}">"#, dict.len())?;
            for (key, value) in sorted(dict) {
                writeln!(out, "<key>{}</key>", escape(key))?;
                write!(out, "<value>")?;
                dumpxml(out, doc, value, codec)?;
                writeln!(out, "</value>")?;
            }
            write!(out, "</dict>")?;
        }
        PdfObject::Stream(stream) => match codec {
            StreamCodec::Raw => out.write_all(stream.raw())?,
            StreamCodec::Binary => out.write_all(&doc.decode_stream(stream)?)?,
            StreamCodec::None | StreamCodec::Text => {
                writeln!(out, "<stream>")?;
                writeln!(out, "<props>")?;
                dumpxml(out, doc, &PdfObject::Dict(stream.dict.clone()), codec)?;
                writeln!(out)?;
                writeln!(out, "</props>")?;
                if codec == StreamCodec::Text {
                    let data = doc.decode_stream(stream)?;
                    writeln!(out, r#"<data size="{}">{}</data>"#, data.len(), escape(&data))?;
                }
                write!(out, "</stream>")?;
            }
        },
        PdfObject::Ref(id) => write!(out, r#"<ref id="{}" generation="{}" />"#, id.num, id.generation)?,
    }
    Ok(())
}

fn dumptrailer<W: Write>(out: &mut W, doc: &Document) -> Result<()> {
    writeln!(out, "<trailer>")?;
    dumpxml(out, doc, &PdfObject::Dict(doc.trailer().clone()), StreamCodec::None)?;
    writeln!(out)?;
    writeln!(out, "</trailer>")?;
    Ok(())
}

fn dumpobject<W: Write>(out: &mut W, doc: &Document, id: ObjectId, codec: StreamCodec) -> Result<()> {
    match doc.dereference(id) {
        Ok(obj) => {
            writeln!(out, r#"<object id="{}">"#, id.num)?;
            dumpxml(out, doc, &obj, codec)?;
            writeln!(out)?;
            writeln!(out, "</object>")?;
        }
        Err(err) => tracing::warn!(object = %id, error = %err, "unreadable object"),
    }
    Ok(())
}

fn dumpallobjs<W: Write>(out: &mut W, doc: &Document, codec: StreamCodec) -> Result<()> {
    writeln!(out, r#"<pdf version="{}">"#, doc.version())?;
    for id in doc.object_ids() {
        dumpobject(out, doc, id, codec)?;
    }
    dumptrailer(out, doc)?;
    writeln!(out, "</pdf>")?;
    Ok(())
}

fn dumpxref<W: Write>(out: &mut W, doc: &Document) -> Result<()> {
    writeln!(out, "<xref>")?;
    for (num, entry) in doc.xref_entries() {
        match entry {
            XrefEntry::Free => writeln!(out, r#"<free id="{num}" />"#)?,
            XrefEntry::InUse { offset, generation } => {
                writeln!(out, r#"<entry id="{num}" generation="{generation}" offset="{offset}" />"#)?;
            }
            XrefEntry::Compressed { container, index } => {
                writeln!(out, r#"<compressed id="{num}" stream="{container}" index="{index}" />"#)?;
            }
        }
    }
    writeln!(out, "</xref>")?;
    Ok(())
}

fn dumppages<W: Write>(out: &mut W, doc: &Document, pages: &[usize], codec: StreamCodec) -> Result<()> {
    for &number in pages {
        let page = doc.page(number)?;
        if codec == StreamCodec::None {
            let id = page.id().map_or_else(String::new, |id| id.num.to_string());
            writeln!(out, r#"<page number="{number}" id="{id}" rotate="{}">"#, page.rotate())?;
            dumpxml(out, doc, &PdfObject::Dict(page.dict().clone()), codec)?;
            writeln!(out)?;
            writeln!(out, "</page>")?;
        } else if codec == StreamCodec::Text {
            let data = page.contents()?;
            writeln!(out, r#"<contents page="{number}" size="{}">{}</contents>"#, data.len(), escape(&data))?;
        } else {
            out.write_all(&page.contents()?)?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PageCommands<'a> {
    page: usize,
    state: quire_core::interp::InterpreterState,
    commands: &'a CommandList,
}

/// One JSON object per page with its draw commands.
fn dumpcommands<W: Write>(out: &mut W, doc: &Document, pages: &[usize]) -> Result<()> {
    for &number in pages {
        let mut interp = doc.page(number)?.interpreter(CommandList::new())?;
        let state = match interp.run(StepBudget::Unbounded) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(page = number, error = %err, "content interpretation failed");
                interp.state()
            }
        };
        let commands = interp.into_sink();
        serde_json::to_writer(
            &mut *out,
            &PageCommands {
                page: number,
                state,
                commands: &commands,
            },
        )?;
        writeln!(out)?;
    }
    Ok(())
}

/// Parse `1,3,7` style lists.
fn parse_list<T: std::str::FromStr>(text: &str, what: &str) -> Result<Vec<T>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| anyhow::anyhow!("invalid {what}: {s:?}")))
        .collect()
}

/// Dump PDF structure as XML, or page drawing commands as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "dumppdf")]
#[command(author, version, about = "Dump PDF structure as XML", long_about = None)]
#[command(group(
    ArgGroup::new("stream_codec")
        .args(["raw", "binary", "text"])
))]
struct Args {
    /// One or more paths to PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// The password to use for decrypting the file
    #[arg(short = 'P', long, default_value = "")]
    password: String,

    /// Comma-separated object numbers to dump
    #[arg(short = 'i', long)]
    objects: Option<String>,

    /// Dump every object, then the trailer
    #[arg(short = 'a', long, action = ArgAction::SetTrue)]
    all: bool,

    /// Dump the trailer dictionary
    #[arg(long, action = ArgAction::SetTrue)]
    trailer: bool,

    /// Dump the merged cross-reference table
    #[arg(long, action = ArgAction::SetTrue)]
    xref: bool,

    /// Comma-separated page numbers (1-based)
    #[arg(short = 'p', long)]
    pages: Option<String>,

    /// Interpret the selected pages (all when none are given) and print
    /// their drawing commands as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    commands: bool,

    /// Path to write output to, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Write stream payloads undecoded
    #[arg(short = 'r', long, action = ArgAction::SetTrue)]
    raw: bool,

    /// Write stream payloads decoded, without escaping
    #[arg(short = 'b', long, action = ArgAction::SetTrue)]
    binary: bool,

    /// Write decoded stream payloads as escaped text
    #[arg(short = 't', long, action = ArgAction::SetTrue)]
    text: bool,
}

impl Args {
    fn codec(&self) -> StreamCodec {
        if self.raw {
            StreamCodec::Raw
        } else if self.binary {
            StreamCodec::Binary
        } else if self.text {
            StreamCodec::Text
        } else {
            StreamCodec::None
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open(path: &PathBuf, password: &str) -> Result<Document> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    // SAFETY: the map is read-only and the file is not modified while the
    // document is alive.
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("cannot map {}", path.display()))?;
    Document::from_mmap(mmap, password).with_context(|| format!("cannot load {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let codec = args.codec();

    let objects: Vec<u32> = match &args.objects {
        Some(list) => parse_list(list, "object number")?,
        None => Vec::new(),
    };
    let pages: Vec<usize> = match &args.pages {
        Some(list) => parse_list(list, "page number")?,
        None => Vec::new(),
    };
    if pages.contains(&0) {
        bail!("page numbers start at 1");
    }

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile).with_context(|| format!("cannot create {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };

    for path in &args.files {
        let doc = open(path, &args.password)?;
        tracing::debug!(
            file = %path.display(),
            version = %doc.version(),
            encrypted = doc.is_encrypted(),
            pages = doc.page_count(),
            "loaded"
        );

        if args.commands {
            let selected = if pages.is_empty() {
                (1..=doc.page_count()).collect()
            } else {
                pages.clone()
            };
            dumpcommands(&mut output, &doc, &selected)?;
            continue;
        }
        if args.all {
            dumpallobjs(&mut output, &doc, codec)?;
            continue;
        }

        for &num in &objects {
            let id = doc
                .object_ids()
                .into_iter()
                .find(|id| id.num == num)
                .unwrap_or(ObjectId::new(num, 0));
            dumpobject(&mut output, &doc, id, codec)?;
        }
        dumppages(&mut output, &doc, &pages, codec)?;
        if args.xref {
            dumpxref(&mut output, &doc)?;
        }
        if args.trailer || (objects.is_empty() && pages.is_empty() && !args.xref) {
            dumptrailer(&mut output, &doc)?;
        }
    }

    output.flush()?;
    Ok(())
}
