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


mod raw;

use std::{
    error::Error as StdError,
    fs::{self, File},
    io,
    io::{prelude::*, BufReader},
};

use anyhow::{anyhow, Context, Error};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

extern crate sharelock_core;
use sharelock_core::{Credential, Engine, KeyMaterial, Params};

/// Add the `--password | --share... --threshold` argument set to a command.
pub(crate) fn credential_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("password")
            .short('p')
            .long("password")
            .value_name("PASSWORD")
            .help("Password protecting the envelope.")
            .action(ArgAction::Set),
    )
    .arg(
        Arg::new("share")
            .short('s')
            .long("share")
            .value_name("SHARE")
            .help(r#"Share of the envelope key, in "index-hex" form (repeat for each share)."#)
            .action(ArgAction::Append)
            .requires("threshold"),
    )
    .arg(
        Arg::new("threshold")
            .short('t')
            .long("threshold")
            .value_name("THRESHOLD")
            .help("Number of shares the key was split with a threshold of.")
            .action(ArgAction::Set)
            .requires("share"),
    )
    .group(
        ArgGroup::new("credential")
            .arg("password")
            .arg("share")
            .required(true),
    )
}

pub(crate) fn credential(matches: &ArgMatches) -> Result<Credential, Error> {
    if let Some(password) = matches.get_one::<String>("password") {
        return Ok(Credential::Password(password.clone()));
    }
    let shares = matches
        .get_many::<String>("share")
        .context("neither --password nor --share provided")?
        .cloned()
        .collect::<Vec<_>>();
    let threshold: u32 = matches
        .get_one::<String>("threshold")
        .context("--share requires a --threshold argument")?
        .parse()
        .context("--threshold argument was not an unsigned integer")?;
    Ok(Credential::Shares { shares, threshold })
}

pub(crate) fn key_material(engine: &Engine, matches: &ArgMatches) -> Result<KeyMaterial, Error> {
    engine
        .key_material(&credential(matches)?)
        .context("recovering key from credential")
}

/// Build the engine from the global `--config` file, or the defaults.
pub(crate) fn engine(matches: &ArgMatches) -> Result<Engine, Error> {
    let params = match matches.get_one::<String>("config") {
        None => Params::default(),
        Some(config_path) => {
            let config = fs::read_to_string(config_path)
                .with_context(|| format!("failed to read config file '{}'", config_path))?;
            toml::from_str::<Params>(&config)
                .with_context(|| format!("failed to parse config file '{}'", config_path))?
        }
    };
    tracing::debug!(?params, "loaded parameters");
    Engine::new(params).context("invalid configuration")
}

/// Convert a library error, giving envelope authentication failures the one
/// message users should see for them.
pub(crate) fn envelope_error(err: sharelock_core::Error) -> Error {
    if err.is_authentication_failure() {
        anyhow!("wrong password or corrupt file")
    } else {
        Error::new(err)
    }
}

pub(crate) fn read_input(input_path: &str) -> Result<Vec<u8>, Error> {
    let (mut stdin_reader, mut file_reader);
    let input: &mut dyn Read = if input_path == "-" {
        stdin_reader = io::stdin();
        &mut stdin_reader
    } else {
        file_reader = File::open(input_path)
            .with_context(|| format!("failed to open input file '{}'", input_path))?;
        &mut file_reader
    };
    let mut buffer_input = BufReader::new(input);

    let mut data = Vec::new();
    buffer_input
        .read_to_end(&mut data)
        .with_context(|| format!("failed to read data from '{}'", input_path))?;
    Ok(data)
}

fn write_output(output_path: &str, data: &[u8]) -> Result<(), Error> {
    let (mut stdout_writer, mut file_writer);
    let output_file: &mut dyn Write = if output_path == "-" {
        stdout_writer = io::stdout();
        &mut stdout_writer
    } else {
        file_writer = File::create(output_path)
            .with_context(|| format!("failed to open output file '{}' for writing", output_path))?;
        &mut file_writer
    };

    output_file
        .write_all(data)
        .with_context(|| format!("failed to write data to '{}'", output_path))?;
    output_file.flush()?;
    Ok(())
}

fn input_output_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("INPUT")
            .help(r#"Path to read data from ("-" to read from stdin)."#)
            .action(ArgAction::Set)
            .allow_hyphen_values(true)
            .required(true)
            .index(1),
    )
    .arg(
        Arg::new("OUTPUT")
            .help(r#"Path to write data to ("-" to write to stdout)."#)
            .action(ArgAction::Set)
            .allow_hyphen_values(true)
            .required(true)
            .index(2),
    )
}

fn input_output(matches: &ArgMatches) -> Result<(&String, &String), Error> {
    let input_path = matches
        .get_one::<String>("INPUT")
        .context("required INPUT argument not provided")?;
    let output_path = matches
        .get_one::<String>("OUTPUT")
        .context("required OUTPUT argument not provided")?;
    Ok((input_path, output_path))
}

// sharelock seal (--password <PW> | (--share <SHARE>)... --threshold <T>) INPUT OUTPUT
fn seal_cli() -> Command {
    input_output_args(credential_args(
        Command::new("seal").about("Encrypt a document into an authenticated envelope."),
    ))
}

fn seal(matches: &ArgMatches) -> Result<(), Error> {
    let engine = engine(matches)?;
    let (input_path, output_path) = input_output(matches)?;

    let key = key_material(&engine, matches)?;
    let plaintext = read_input(input_path)?;
    let envelope = engine
        .seal(&key, &plaintext)
        .context("sealing envelope")?;

    write_output(output_path, &envelope)
}

// sharelock open (--password <PW> | (--share <SHARE>)... --threshold <T>) INPUT OUTPUT
fn open_cli() -> Command {
    input_output_args(credential_args(
        Command::new("open").about("Decrypt an envelope, failing if it has been modified."),
    ))
}

fn open(matches: &ArgMatches) -> Result<(), Error> {
    let engine = engine(matches)?;
    let (input_path, output_path) = input_output(matches)?;

    let key = key_material(&engine, matches)?;
    let envelope = read_input(input_path)?;
    let plaintext = engine
        .open(&key, &envelope)
        .map_err(envelope_error)
        .with_context(|| format!("opening envelope '{}'", input_path))?;

    write_output(output_path, &plaintext)
}

// sharelock split --password <PW> -n <SHARES> -k <THRESHOLD>
fn split_cli() -> Command {
    Command::new("split")
        .about("Split the key of a password into shares. Any THRESHOLD of the shares can be used in place of the password.")
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .value_name("PASSWORD")
                .help("Password whose key is split.")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new("shares")
                .short('n')
                .long("shares")
                .value_name("NUM SHARES")
                .help("Number of shares to create (must not be smaller than --threshold).")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new("threshold")
                .short('k')
                .long("threshold")
                .value_name("THRESHOLD")
                .help("Number of shares required to recover the key (must not be larger than --shares).")
                .action(ArgAction::Set)
                .required(true),
        )
}

fn split(matches: &ArgMatches) -> Result<(), Error> {
    let engine = engine(matches)?;
    let password = matches
        .get_one::<String>("password")
        .context("required --password argument not provided")?;
    let share_count: u32 = matches
        .get_one::<String>("shares")
        .context("required --shares argument not provided")?
        .parse()
        .context("--shares argument was not an unsigned integer")?;
    let threshold: u32 = matches
        .get_one::<String>("threshold")
        .context("required --threshold argument not provided")?
        .parse()
        .context("--threshold argument was not an unsigned integer")?;

    let shares = engine
        .split_password(password, share_count, threshold)
        .context("splitting password key")?;

    let mut stdout = io::stdout().lock();
    for share in shares {
        writeln!(stdout, "{}", share)?;
    }
    Ok(())
}

// sharelock rekey (--password <PW> | (--share <SHARE>)... --threshold <T>) --new-password <PW> INPUT OUTPUT
fn rekey_cli() -> Command {
    input_output_args(credential_args(
        Command::new("rekey").about("Re-encrypt an envelope under a new password."),
    ))
    .arg(
        Arg::new("new-password")
            .long("new-password")
            .value_name("PASSWORD")
            .help("Password the envelope is re-encrypted with.")
            .action(ArgAction::Set)
            .required(true),
    )
}

fn rekey(matches: &ArgMatches) -> Result<(), Error> {
    let engine = engine(matches)?;
    let (input_path, output_path) = input_output(matches)?;
    let new_password = matches
        .get_one::<String>("new-password")
        .context("required --new-password argument not provided")?;

    let old_key = key_material(&engine, matches)?;
    let new_key = sharelock_core::key_from_password(new_password);
    let envelope = read_input(input_path)?;
    let rekeyed = engine
        .rekey(&old_key, &new_key, &envelope)
        .map_err(envelope_error)
        .with_context(|| format!("rekeying envelope '{}'", input_path))?;

    write_output(output_path, &rekeyed)
}

fn cli() -> Command {
    Command::new("sharelock")
        .version("0.0.0")
        .author("Aleksa Sarai <cyphar@cyphar.com>")
        .about("Seal documents with a password or a threshold of key shares.")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("TOML file overriding share limits and stretch rounds.")
                .action(ArgAction::Set)
                .global(true),
        )
        // sharelock seal (--password <PW> | (--share <SHARE>)... --threshold <T>) INPUT OUTPUT
        .subcommand(seal_cli())
        // sharelock open (--password <PW> | (--share <SHARE>)... --threshold <T>) INPUT OUTPUT
        .subcommand(open_cli())
        // sharelock split --password <PW> -n <SHARES> -k <THRESHOLD>
        .subcommand(split_cli())
        // sharelock rekey ... --new-password <PW> INPUT OUTPUT
        .subcommand(rekey_cli())
        // sharelock raw ...
        .subcommand(raw::subcommands())
}

fn main() -> Result<(), Box<dyn StdError>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();

    let mut app = cli();

    let ret = match app.get_matches_mut().subcommand() {
        Some(("raw", sub_matches)) => raw::submatch(&mut app, sub_matches),
        Some(("seal", sub_matches)) => seal(sub_matches),
        Some(("open", sub_matches)) => open(sub_matches),
        Some(("split", sub_matches)) => split(sub_matches),
        Some(("rekey", sub_matches)) => rekey(sub_matches),
        Some((subcommand, _)) => {
            // We should never end up here.
            app.print_help()?;
            Err(anyhow!("unknown subcommand '{}'", subcommand))
        }
        None => {
            app.print_help()?;
            Err(anyhow!("no subcommand specified"))
        }
    }?;

    Ok(ret)
}

#[test]
fn verify_cli() {
    cli().debug_assert();
}

#[test]
fn credential_from_args() {
    let matches = cli()
        .try_get_matches_from([
            "sharelock", "open", "--share", "1-ab", "--share", "2-cd", "-t", "2", "in", "out",
        ])
        .unwrap();
    let (_, sub_matches) = matches.subcommand().unwrap();
    match credential(sub_matches).unwrap() {
        Credential::Shares { shares, threshold } => {
            assert_eq!(shares, vec!["1-ab", "2-cd"]);
            assert_eq!(threshold, 2);
        }
        other => panic!("unexpected credential {:?}", other),
    }
}

#[test]
fn credential_is_required() {
    assert!(cli()
        .try_get_matches_from(["sharelock", "open", "in", "out"])
        .is_err());
    assert!(cli()
        .try_get_matches_from(["sharelock", "open", "-p", "pw", "-s", "1-ab", "in", "out"])
        .is_err());
}
