// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::styling::Styles;
use clap::error::ErrorKind;
use clap::{Parser, crate_description, crate_version};
use color_eyre::config::HookBuilder;
use color_eyre::eyre::{Report, Result};
use env_logger::Target;
use hdatutil::ConversionParams;
use hdatutil::convert::{Conversion, Outcome};
use hdatutil::hdat::NtupleParser;
use hdatutil::spira::HeaderVariant;
use log::{LevelFilter, debug};
use owo_colors::OwoColorize;

#[derive(Parser)]
#[command(
	version,
	about = format!("{} v{}", crate_description!(), crate_version!()),
	styles(style()),
	disable_colored_help(false)
)]
struct CliArguments
{
	#[arg(short = 'v', long = "verbose")]
	/// Print what is being done on stdout
	verbose: bool,
	#[arg(short = 'q', long = "quiet")]
	/// Build the device tree but print nothing at all once the dumps are loaded
	quiet: bool,
	#[arg(short = 's', long = "spirah")]
	/// The header dump is a SPIRA-H and the heap dump starts with a SPIRA-S
	spirah: bool,
	#[arg(short = 'b', long = "keep-blobs")]
	/// Keep large blob properties as they are instead of squashing them
	keep_blobs: bool,

	/// Dump of the SPIRA (or SPIRA-H) structure
	header_dump: PathBuf,
	/// Dump of the HDAT heap
	heap_dump: PathBuf,
}

impl ConversionParams for CliArguments
{
	fn header_variant(&self) -> HeaderVariant
	{
		if self.spirah { HeaderVariant::Spirah } else { HeaderVariant::Spira }
	}

	fn keep_blobs(&self) -> bool
	{
		self.keep_blobs
	}

	fn quiet(&self) -> bool
	{
		self.quiet
	}

	fn verbose(&self) -> bool
	{
		self.verbose
	}
}

type PanicHookFunc = Box<dyn Fn(&std::panic::PanicHookInfo<'_>) + Send + Sync + 'static>;

const CUT_HERE: &str = "------------[ ✂ cut here ✂ ]------------";

struct CrashPanic
{
	inner_hook: PanicHookFunc,
}

impl CrashPanic
{
	pub fn install(self)
	{
		std::panic::set_hook(Box::new(move |panic_info| {
			eprintln!("{}", CUT_HERE);
			eprintln!("hdata v{} crashed converting a dump", crate_version!());
			eprintln!();
			(*self.inner_hook)(panic_info);
			eprintln!();
			eprintln!("{}", "Please include all lines down to this one from the cut here marker".yellow());
			eprintln!("{}", "along with the command line, and if you can, the two dump files.".yellow());
		}));
	}
}

fn install_error_handler() -> Result<()>
{
	// Let color-eyre build its usual pair of hooks and wrap ours around the panic one
	let (panic_hook, eyre_hook) = HookBuilder::default().try_into_hooks()?;

	CrashPanic {
		inner_hook: panic_hook.into_panic_hook(),
	}
	.install();

	eyre_hook.install()?;
	Ok(())
}

/// Clap v3 style (approximate)
/// See https://stackoverflow.com/a/75343828
fn style() -> Styles
{
	let yellow = anstyle::Style::new()
		.fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)))
		.bold();
	Styles::styled()
		.usage(yellow)
		.header(yellow)
		.literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
}

fn init_logging(cli_args: &CliArguments)
{
	let mut builder = env_logger::Builder::new();
	if cli_args.verbose() {
		builder.filter_level(LevelFilter::Debug).target(Target::Stdout);
	} else {
		builder.filter_level(LevelFilter::Warn);
	}
	builder.format_timestamp(None).parse_default_env().init();
}

fn main() -> Result<ExitCode>
{
	install_error_handler()?;

	let cli_args = match CliArguments::try_parse() {
		Ok(cli_args) => cli_args,
		Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
		Err(e) => {
			// Anything else is a usage error, and those exit 1 here rather than clap's 2
			e.print().ok();
			return Ok(ExitCode::FAILURE);
		},
	};
	init_logging(&cli_args);

	let conversion = match Conversion::load(&cli_args, &cli_args.header_dump, &cli_args.heap_dump) {
		Ok(conversion) => conversion,
		Err(e) => {
			eprintln!("Error: {:#}", Report::new(e));
			return Ok(ExitCode::FAILURE);
		},
	};

	if cli_args.quiet() {
		log::set_max_level(LevelFilter::Off);
	}

	let mut out = stdout().lock();
	match conversion.run(&cli_args, &NtupleParser, &mut out) {
		Ok(Outcome::Written {
			bytes,
		}) => debug!("Done, {} bytes of FDT written", bytes),
		// Not being able to flatten has already been reported and still counts as success
		Ok(Outcome::Suppressed | Outcome::NotFlattened) => (),
		Err(e) => {
			if !cli_args.quiet() {
				eprintln!("Error: {:#}", Report::new(e));
			}
			return Ok(ExitCode::FAILURE);
		},
	}

	Ok(ExitCode::SUCCESS)
}
