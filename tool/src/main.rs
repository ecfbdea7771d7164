use std::fs;
use std::io::Read;
use std::process;

use anyhow::Context;
use anyhow::Error;
use anyhow::{anyhow, bail};
use clap::{App, AppSettings, Arg, ArgMatches};
use ntfs_ea::raw::MAX_VALUE_LEN;
use ntfs_ea::{EaError, EaRecord, EaService, QueryEa, SetEa};

#[derive(Debug)]
#[cfg_attr(not(windows), allow(dead_code))]
enum Command {
    Read { name: Option<String> },
    Write { name: String, content: Vec<u8> },
}

#[cfg_attr(not(windows), allow(dead_code))]
fn print_record(record: &EaRecord) {
    println!("\t- EA next entry offset = {:#x}", record.next_entry_offset);
    println!("\t- EA flags             = {:#x}", record.flags);
    println!("\t- EA name length       = {}", record.name.len());
    println!("\t- EA value length      = {}", record.value.len());
    println!(
        "\t- EA name              = {}",
        String::from_utf8_lossy(&record.name)
    );

    if !record.value.is_empty() {
        println!("\t- EA value:");
        hexdump::hexdump(&record.value);
    }
    println!();
}

#[cfg_attr(not(windows), allow(dead_code))]
fn read<Q, S, H>(service: &EaService<Q, S>, handle: &H, name: Option<&str>) -> Result<(), Error>
where
    Q: QueryEa<H>,
{
    match name {
        None => {
            let records = service.read_all(handle)?;
            if records.is_empty() {
                println!("[!] There's no EA attribute on the file");
                return Ok(());
            }
            println!("[EATOOL]::{} EA record(s)", records.len());
            for record in &records {
                print_record(record);
            }
        }
        Some(name) => match service.read_one(handle, name.as_bytes())? {
            Some(record) => print_record(&record),
            None => println!("[!] No EA named {:?} on the file", name),
        },
    }
    Ok(())
}

#[cfg_attr(not(windows), allow(dead_code))]
fn write<Q, S, H>(
    service: &EaService<Q, S>,
    handle: &H,
    name: &str,
    content: &[u8],
) -> Result<(), Error>
where
    Q: QueryEa<H>,
    S: SetEa<H>,
{
    match service.write(handle, name.as_bytes(), content)? {
        Some(record) => {
            println!("[EATOOL]::Wrote EA {:?}", name);
            print_record(&record);
        }
        None => println!("[EATOOL]::Removed EA {:?}", name),
    }
    Ok(())
}

#[cfg(windows)]
fn exec(path: &str, command: Command) -> Result<(), Error> {
    use ntfs_ea::nt;
    use ntfs_ea::Options;

    let options = Options {
        verify_after_write: true,
        ..Options::default()
    };
    let service = EaService::new_with_options(nt::NtEa, nt::NtEa, options)?;

    match command {
        Command::Read { name } => {
            let file = nt::open_read(path)?;
            read(&service, &file, name.as_deref())
        }
        Command::Write { name, content } => {
            let file = nt::open_read_write(path)?;
            write(&service, &file, &name, &content)
        }
    }
}

#[cfg(not(windows))]
fn exec(path: &str, command: Command) -> Result<(), Error> {
    bail!(
        "can't {:?} on {}: NTFS extended attributes are only reachable from Windows",
        command,
        path
    )
}

fn content(matches: &ArgMatches) -> Result<Vec<u8>, Error> {
    if let Some(content) = matches.value_of("content") {
        return Ok(content.as_bytes().to_vec());
    }

    if let Some(input) = matches.value_of("input") {
        let file = fs::File::open(input).map_err(|e| ntfs_ea::file_open_failed(input, e))?;
        let content =
            read_content(file).with_context(|| anyhow!("reading content from '{}'", input))?;
        log::debug!("read {} content bytes from {}", content.len(), input);
        return Ok(content);
    }

    Err(EaError::NoContentProvided.into())
}

/// All of `from`, refusing anything that won't fit in one EA value.
fn read_content<R: Read>(from: R) -> Result<Vec<u8>, Error> {
    let mut content = Vec::new();
    // one byte over the limit is enough to know it's too long
    from.take(MAX_VALUE_LEN as u64 + 1)
        .read_to_end(&mut content)?;

    if content.len() > MAX_VALUE_LEN {
        bail!(EaError::ValueTooLong { len: content.len() });
    }

    Ok(content)
}

fn command(matches: &ArgMatches) -> Result<Command, Error> {
    let name = matches.value_of("name").map(|name| name.to_string());

    if matches.is_present("read") {
        return Ok(Command::Read { name });
    }

    if matches.is_present("write") {
        return Ok(Command::Write {
            name: name.ok_or_else(|| anyhow!("must provide a name for the EA"))?,
            content: content(matches)?,
        });
    }

    bail!("choose one of -r or -w")
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let path = matches
        .value_of("file")
        .ok_or_else(|| anyhow!("must provide a file"))?;
    let command = command(matches)?;
    exec(path, command).with_context(|| anyhow!("while processing '{}'", path))
}

fn main() {
    env_logger::init();

    let matches = App::new("eatool")
        .about("Reads and writes NTFS extended attributes")
        .setting(AppSettings::ArgRequiredElseHelp)
        .arg(
            Arg::with_name("read")
                .short("r")
                .help("read all EAs, or only the one given with -n")
                .conflicts_with("write"),
        )
        .arg(
            Arg::with_name("write")
                .short("w")
                .help("write the EA given with -n")
                .requires("name"),
        )
        .arg(
            Arg::with_name("file")
                .short("f")
                .takes_value(true)
                .value_name("FILE")
                .required(true)
                .help("file whose EAs to use"),
        )
        .arg(
            Arg::with_name("name")
                .short("n")
                .takes_value(true)
                .value_name("NAME")
                .help("EA name"),
        )
        .arg(
            Arg::with_name("content")
                .short("c")
                .takes_value(true)
                .value_name("CONTENT")
                .conflicts_with("input")
                .help("EA value, as given"),
        )
        .arg(
            Arg::with_name("input")
                .short("i")
                .takes_value(true)
                .value_name("CONTENT_FILE")
                .help("read the EA value from a file, up to 65535 bytes"),
        )
        .get_matches();

    if let Err(e) = run(&matches) {
        eprintln!("[EATOOL]::Error: {:#}", e);
        process::exit(-1);
    }
}
