use std::fs::{self, File};
use std::io::Read;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use data_encoding::HEXLOWER;
use owo_colors::{OwoColorize, Style};
use zonemd::zone::{VerifyIssue, Zone};
use zonemd_proto::dnssec::ZoneSigningKey;

mod args;

use args::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    let t0 = Instant::now();

    let content = match &args.zonefile {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("could not read zone file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("could not read zone from stdin")?;
            buf
        }
    };

    if !args.quiet {
        eprint!("Loading Zone...");
    }
    let mut zone = Zone::load(args.origin.clone(), &content, args.store_kind())?;
    if !args.quiet {
        eprintln!("{} records", zone.record_count());
    }
    report_warnings(&mut zone);

    let zsk = match &args.zsk_file {
        Some(path) => Some(
            ZoneSigningKey::from_file(path)
                .with_context(|| format!("could not load zone signing key {}", path.display()))?,
        ),
        None => None,
    };

    if !args.placeholders.is_empty() {
        if !args.quiet {
            eprintln!("Replacing ZONEMD RRset with placeholders");
        }
        zone.add_placeholders(&args.placeholders)?;
        report_warnings(&mut zone);
    }
    let t1 = Instant::now();

    if args.calculate {
        if !args.quiet {
            eprintln!("Calculating digest(s)");
        }
        zone.calculate(zsk.as_ref())?;
        report_warnings(&mut zone);
    }
    let t2 = Instant::now();

    let mut rc = 0;
    if args.verify {
        let issues = zone.verify()?;
        report_warnings(&mut zone);
        report_verify(&issues, args.quiet);
        if !issues.is_empty() {
            rc = 1;
        }
    }
    let t3 = Instant::now();

    if let Some(update_path) = &args.update_file {
        let updates = fs::read_to_string(update_path)
            .with_context(|| format!("could not read update file {}", update_path.display()))?;
        if !args.quiet {
            eprint!("Updating Zone...");
        }
        let stats = zone.apply_update(&updates);
        if !args.quiet {
            eprintln!("{} additions, {} deletions", stats.additions, stats.deletions);
        }
        report_warnings(&mut zone);

        if args.calculate {
            zone.calculate(zsk.as_ref())?;
            report_warnings(&mut zone);
        }
    }
    let t4 = Instant::now();

    if let Some(output) = &args.output_file {
        if args.calculate || !args.placeholders.is_empty() {
            let mut file = File::create(output)
                .with_context(|| format!("could not create output file {}", output.display()))?;
            zone.write_to(&mut file)
                .with_context(|| format!("could not write zone to {}", output.display()))?;
        }
    }

    if args.print_timings {
        println!(
            "TIMINGS: load {:7.2} calculate {:7.2} verify {:7.2} update {:7.2}",
            millis(t0, t1),
            millis(t1, t2),
            millis(t2, t3),
            millis(t3, t4)
        );
    }

    if rc != 0 {
        process::exit(rc);
    }
    Ok(())
}

fn millis(from: Instant, to: Instant) -> f64 {
    to.duration_since(from).as_secs_f64() * 1000.0
}

fn report_warnings(zone: &mut Zone) {
    for warning in zone.take_warnings() {
        eprintln!("Warning: {}", warning);
    }
}

fn report_verify(issues: &[VerifyIssue], quiet: bool) {
    let output = owo_colors::Stream::Stderr;
    let err_style = Style::new().bold().red();
    let ok_style = Style::new().bold().green();

    if issues.is_empty() {
        if !quiet {
            let msg = "Found and calculated digests MATCH.";
            eprintln!("{}", msg.if_supports_color(output, |s| s.style(ok_style)));
        }
        return;
    }

    for issue in issues {
        match issue {
            VerifyIssue::SerialMismatch {
                zonemd_serial,
                soa_serial,
            } => {
                let msg = format!(
                    "SOA serial ({}) does not match ZONEMD serial ({})",
                    soa_serial, zonemd_serial
                );
                eprintln!("{}", msg.if_supports_color(output, |s| s.style(err_style)));
            }
            VerifyIssue::UnsupportedDigest { digest_type } => {
                let msg = format!("Unable to verify unsupported digest type {}", digest_type);
                eprintln!("{}", msg.if_supports_color(output, |s| s.style(err_style)));
            }
            VerifyIssue::DigestMismatch {
                digest_type,
                found,
                computed,
            } => {
                let msg = format!(
                    "Found and calculated digests for type {} do NOT match.",
                    digest_type
                );
                eprintln!("{}", msg.if_supports_color(output, |s| s.style(err_style)));
                eprintln!("Found     : {}", HEXLOWER.encode(found));
                eprintln!("Calculated: {}", HEXLOWER.encode(computed));
            }
        }
    }
}
