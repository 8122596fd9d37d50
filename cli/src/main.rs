use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;

use argparse::{ArgumentParser, Collect, Store, StoreOption};
use clkbuf_generic::{BufferSpec, ClkbufmapError, ClkbufmapOptions, GeneratedClockRule, clkbufmap};
use clkbuf_netlist::{Design, Selection};
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug)]
enum Error {
    Usage(String),
    Io(String, io::Error),
    Parse(String, String),
    Pass(ClkbufmapError),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Usage(message) => write!(f, "{message}"),
            Error::Io(path, error) => write!(f, "{path}: {error}"),
            Error::Parse(path, message) => write!(f, "{path}: {message}"),
            Error::Pass(error) => write!(f, "{error}"),
        }
    }
}

impl From<ClkbufmapError> for Error {
    fn from(error: ClkbufmapError) -> Self {
        Error::Pass(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    YosysJson,
    Rtlil,
}

impl Format {
    fn from_path(path: &str) -> Result<Format, Error> {
        match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::YosysJson),
            Some("il") => Ok(Format::Rtlil),
            _ => Err(Error::Usage(format!("{path}: unknown netlist format (expected .json or .il)"))),
        }
    }
}

#[derive(Debug, Default)]
struct Arguments {
    input: String,
    output: Option<String>,
    buf: Option<String>,
    buf_ports: Option<String>,
    inpad: Option<String>,
    inpad_ports: Option<String>,
    select: Option<String>,
    exempt_drivers: Vec<String>,
    gclk_cell: Option<String>,
    gclk_ibuf: Option<String>,
    gclk_buf: Option<String>,
}

fn parse_args() -> Arguments {
    let mut args = Arguments::default();
    {
        let mut parser = ArgumentParser::new();
        parser.set_description("Insert clock buffers on nets that drive clock sink ports.");
        parser.refer(&mut args.buf).add_option(&["--buf"], StoreOption, "Clock buffer cell type");
        parser.refer(&mut args.buf_ports).add_option(
            &["--buf-ports"],
            StoreOption,
            "Clock buffer ports, as OUTPUT[:INPUT]",
        );
        parser.refer(&mut args.inpad).add_option(&["--inpad"], StoreOption, "Input pad cell type for top-level clocks");
        parser.refer(&mut args.inpad_ports).add_option(
            &["--inpad-ports"],
            StoreOption,
            "Input pad ports, as OUTPUT[:INPUT]",
        );
        parser.refer(&mut args.select).add_option(
            &["--select"],
            StoreOption,
            "Only consider selected wires (ignores clkbuf_inhibit)",
        );
        parser.refer(&mut args.exempt_drivers).add_option(
            &["--exempt-driver"],
            Collect,
            "Cell type whose outputs never get a clock buffer (repeatable)",
        );
        parser.refer(&mut args.gclk_cell).add_option(
            &["--gclk-cell"],
            StoreOption,
            "Sequential cell type and clock port used to detect generated clocks, as TYPE:PORT",
        );
        parser.refer(&mut args.gclk_ibuf).add_option(
            &["--gclk-ibuf"],
            StoreOption,
            "Input buffer cell type and output port whose clocks are not generated, as TYPE:PORT",
        );
        parser.refer(&mut args.gclk_buf).add_option(&["--gclk-buf"], StoreOption, "Buffer cell type for generated clocks");
        parser.refer(&mut args.input).add_argument("INPUT", Store, "Input netlist (.json or .il)").required();
        parser.refer(&mut args.output).add_argument("OUTPUT", StoreOption, "Output netlist (.json or .il)");
        parser.parse_args_or_exit();
    }
    args
}

fn buffer_spec(cell_type: &Option<String>, ports: &Option<String>, flag: &str) -> Result<Option<BufferSpec>, Error> {
    match (cell_type, ports) {
        (None, None) => Ok(None),
        (Some(cell_type), Some(ports)) => Ok(Some(BufferSpec::parse(cell_type, ports)?)),
        _ => Err(Error::Usage(format!("--{flag} and --{flag}-ports must be given together"))),
    }
}

fn type_and_port(value: &str, flag: &str) -> Result<(String, String), Error> {
    match value.split_once(':') {
        Some((cell_type, port)) if !cell_type.is_empty() && !port.is_empty() => {
            Ok((cell_type.to_owned(), port.to_owned()))
        }
        _ => Err(Error::Usage(format!("--{flag} expects TYPE:PORT, found `{value}`"))),
    }
}

fn options(args: &Arguments) -> Result<ClkbufmapOptions, Error> {
    let mut options = ClkbufmapOptions::new();
    options.buffer = buffer_spec(&args.buf, &args.buf_ports, "buf")?;
    options.inpad = buffer_spec(&args.inpad, &args.inpad_ports, "inpad")?;
    if let Some(select) = &args.select {
        let selection = Selection::parse(select).map_err(|error| Error::Usage(error.to_string()))?;
        options = options.with_selection(selection);
    }
    for cell_type in &args.exempt_drivers {
        options = options.with_exempt_driver(cell_type);
    }
    match (&args.gclk_cell, &args.gclk_buf) {
        (Some(cell), Some(buffer_type)) => {
            let (cell_type, clock_port) = type_and_port(cell, "gclk-cell")?;
            let input_buffer = args.gclk_ibuf.as_deref().map(|value| type_and_port(value, "gclk-ibuf")).transpose()?;
            options = options.with_generated_clock(GeneratedClockRule {
                cell_type,
                clock_port,
                input_buffer,
                buffer_type: buffer_type.clone(),
            });
        }
        (None, None) if args.gclk_ibuf.is_none() => (),
        _ => return Err(Error::Usage("--gclk-cell and --gclk-buf must be given together".into())),
    }
    Ok(options)
}

fn read_design(path: &str, format: Format) -> Result<Design, Error> {
    let io_error = |error| Error::Io(path.to_owned(), error);
    match format {
        Format::YosysJson => {
            let mut reader = BufReader::new(File::open(path).map_err(io_error)?);
            clkbuf_yosys_json::import(&mut reader).map_err(|error| Error::Parse(path.to_owned(), error.to_string()))
        }
        Format::Rtlil => {
            let text = std::fs::read_to_string(path).map_err(io_error)?;
            Design::from_str(&text).map_err(|error| Error::Parse(path.to_owned(), error.to_string()))
        }
    }
}

fn write_design(writer: &mut impl Write, format: Format, design: &Design) -> io::Result<()> {
    match format {
        Format::YosysJson => clkbuf_yosys_json::export(writer, design)?,
        Format::Rtlil => write!(writer, "{design}")?,
    }
    writer.flush()
}

fn run(args: &Arguments) -> Result<(), Error> {
    let options = options(args)?;
    let input_format = Format::from_path(&args.input)?;
    let output_format = match &args.output {
        Some(path) => Format::from_path(path)?,
        None => input_format,
    };
    let mut design = read_design(&args.input, input_format)?;
    let stats = clkbufmap(&mut design, &options)?;
    info!("clkbufmap: {stats}");
    match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|error| Error::Io(path.clone(), error))?;
            write_design(&mut BufWriter::new(file), output_format, &design)
                .map_err(|error| Error::Io(path.clone(), error))?;
        }
        None => {
            write_design(&mut io::stdout().lock(), output_format, &design)
                .map_err(|error| Error::Io("<stdout>".into(), error))?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_tree::HierarchicalLayer::new(2).with_writer(io::stderr).with_targets(true))
        .init();

    let args = parse_args();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
