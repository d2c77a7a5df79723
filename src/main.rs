use jvmlink::jvm::class_graph::ClassPath;
use jvmlink::jvm::*;
use jvmlink::*;

use clap::{Arg, ArgAction, Command};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("JVM class linker")
        .version("0.1.0")
        .about("Links classes of the core Java library and prints their dispatch tables")
        .arg(
            Arg::new("layout")
                .long("layout")
                .value_name("LAYOUT")
                .value_parser(["lp64", "ilp32", "host"])
                .default_value("host")
                .help("Data layout used for instance sizes and field offsets"),
        )
        .arg(
            Arg::new("no verify")
                .long("no-verify")
                .action(ArgAction::SetTrue)
                .help("Skip loading constraints and subtype constraint checks"),
        )
        .arg(
            Arg::new("allow unimplemented")
                .long("allow-unimplemented")
                .action(ArgAction::SetTrue)
                .help("Link concrete classes that leave interface methods unimplemented"),
        )
        .arg(
            Arg::new("CLASSES")
                .help("Classes to link (binary names, or array descriptors such as [I)")
                .required(true)
                .num_args(1..)
                .index(1),
        )
        .get_matches();

    let mut settings = Settings::new();
    settings.layout = match matches.get_one::<String>("layout").map(String::as_str) {
        Some("lp64") => DataLayout::LP64,
        Some("ilp32") => DataLayout::ILP32,
        _ => DataLayout::host(),
    };
    settings.verify = !matches.get_flag("no verify");
    settings.require_concrete_implementations = !matches.get_flag("allow unimplemented");
    log::info!("Linking with {:?}", settings);

    let vm = Vm::new(settings, Arc::new(ClassPath::with_java_library()));
    let names = matches
        .get_many::<String>("CLASSES")
        .into_iter()
        .flatten();

    for name in names {
        let class = vm.load_class_named(LoaderId::BOOTSTRAP, name)?;
        if let Err(err) = vm.link_class(&class) {
            log::warn!("Failed to link {}: {}", name, err);
        }
        describe(&class);
    }

    Ok(())
}

fn describe(class: &ClassInfo) {
    println!("{}", class.name.as_str());
    println!("  state: {:?}", class.state());

    let linked = match class.linked() {
        Some(linked) => linked,
        None => return,
    };
    let vtable = &linked.vtable;
    println!("  instance size: {}", linked.instance_size);
    println!(
        "  numbering: baseval={} diffval={}",
        vtable.baseval(),
        vtable.diffval()
    );

    println!("  vtable ({} slots):", vtable.len());
    for (slot, entry) in vtable.entries().iter().enumerate() {
        println!("    {:>3}: {:?}", slot, entry);
    }

    for index in 0..vtable.interface_table_len() {
        if let Some(row) = vtable.interface_entries(index) {
            println!("  interface #{}: {:?}", index, row);
        }
    }
}
