/*
 * sharelock: password and threshold-share protected document storage
 * Copyright (C) 2018-2022 Aleksa Sarai <cyphar@cyphar.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */


use anyhow::{anyhow, Context, Error};
use clap::{Arg, ArgAction, ArgMatches, Command};

extern crate sharelock_core;
use sharelock_core::latest::{Envelope, FromWire, HEADER_LENGTH};

fn input_arg() -> Arg {
    Arg::new("INPUT")
        .help(r#"Path to the envelope ("-" to read from stdin)."#)
        .action(ArgAction::Set)
        .allow_hyphen_values(true)
        .required(true)
        .index(1)
}

// sharelock raw inspect INPUT
fn raw_inspect_cli() -> Command {
    Command::new("inspect")
        .about("Print the header fields of an envelope. Nothing is decrypted and the tag is not checked.")
        .arg(input_arg())
}

fn raw_inspect(matches: &ArgMatches) -> Result<(), Error> {
    let input_path = matches
        .get_one::<String>("INPUT")
        .context("required INPUT argument not provided")?;

    let envelope = Envelope::from_wire(crate::read_input(input_path)?)
        .with_context(|| format!("parsing envelope '{}'", input_path))?;

    println!("Salt: {}", hex::encode(envelope.salt()));
    println!("Nonce: {}", hex::encode(envelope.nonce()));
    println!("Tag: {}", hex::encode(envelope.tag()));
    println!("Ciphertext-Length: {}", envelope.ciphertext_len());
    println!(
        "Envelope-Length: {}",
        HEADER_LENGTH + envelope.ciphertext_len()
    );

    Ok(())
}

// sharelock raw verify (--password <PW> | (--share <SHARE>)... --threshold <T>) INPUT
fn raw_verify_cli() -> Command {
    crate::credential_args(
        Command::new("verify")
            .about("Check that a credential opens an envelope, without writing out the plaintext."),
    )
    .arg(input_arg())
}

fn raw_verify(matches: &ArgMatches) -> Result<(), Error> {
    let engine = crate::engine(matches)?;
    let input_path = matches
        .get_one::<String>("INPUT")
        .context("required INPUT argument not provided")?;

    let key = crate::key_material(&engine, matches)?;
    let envelope = crate::read_input(input_path)?;
    let plaintext = engine
        .open(&key, &envelope)
        .map_err(crate::envelope_error)
        .with_context(|| format!("verifying envelope '{}'", input_path))?;

    println!("Envelope '{}' is authentic ({} bytes).", input_path, plaintext.len());
    Ok(())
}

pub(crate) fn submatch(app: &mut Command, matches: &ArgMatches) -> Result<(), Error> {
    match matches.subcommand() {
        Some(("inspect", sub_matches)) => raw_inspect(sub_matches),
        Some(("verify", sub_matches)) => raw_verify(sub_matches),
        Some((subcommand, _)) => {
            // We should never end up here.
            app.print_help()?;
            Err(anyhow!("unknown subcommand 'raw {}'", subcommand))
        }
        None => {
            app.print_help()?;
            Err(anyhow!("no 'raw' subcommand specified"))
        }
    }
}

pub(crate) fn subcommands() -> Command {
    Command::new("raw")
        .about("Operate directly on the envelope format, for debugging and recovery tooling.")
        // sharelock raw inspect INPUT
        .subcommand(raw_inspect_cli())
        // sharelock raw verify (--password <PW> | (--share <SHARE>)... --threshold <T>) INPUT
        .subcommand(raw_verify_cli())
}
