use clap::{App, Arg};
use jvm_core::class_file::LoaderConfig;
use jvm_core::read::ByteReader;
use jvm_core::ClassFile;
use log::error;
use std::path::Path;
use std::process::exit;

fn main() {
    pretty_env_logger::init();

    let matches = App::new("jvm_core")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Decodes a JVM class file and prints its structure")
        .arg(
            Arg::with_name("path")
                .help("path to a .class file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("dump-class-files")
                .short("d")
                .long("dump-class-files")
                .help("print the decoded structure of the class file"),
        )
        .get_matches();

    let path = matches.value_of("path").expect("path is required");
    let dump = matches.is_present("dump-class-files");

    match load(Path::new(path), dump) {
        Ok(()) => exit(0),
        Err(err) => {
            error!("failed to load {}: {}", path, err);
            exit(1)
        }
    }
}

fn load(path: &Path, dump: bool) -> jvm_core::Result<()> {
    let bytes = std::fs::read(path)?;
    let mut reader = ByteReader::new(&bytes);
    let class = ClassFile::read(&mut reader, LoaderConfig::default())?;

    if dump {
        println!("{:#?}", class);
    } else {
        println!("{}", class.name());
    }

    Ok(())
}
