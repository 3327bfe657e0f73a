extern crate texture_layout;
#[macro_use]
extern crate serde;

use texture_layout::*;
use clap::*;

use std::collections::HashMap;
use std::io::prelude::*;
use std::fs::{File, OpenOptions};

#[derive(Copy, Clone, Serialize, Deserialize)]
struct Element {
    origin: Point,
    size: Size,
}

#[derive(Serialize, Deserialize)]
struct Session {
    layout: TextureLayout,
    names: HashMap<String, Element>,
    next_id: u32,
}

fn atlas_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("ATLAS")
        .short("a")
        .long("atlas")
        .help("Sets the layout file to use")
        .value_name("FILE")
        .takes_value(true)
        .required(false)
}

fn svg_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("SVG_OUTPUT")
        .long("svg")
        .help("Dump the layout in an SVG file")
        .value_name("SVG_OUTPUT")
        .takes_value(true)
        .required(false)
}

fn size_arg(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .help(help)
        .value_name(name)
        .takes_value(true)
        .required(true)
}

fn main() {
    env_logger::init();

    let matches = App::new("Texture layout command-line interface")
        .version("0.1")
        .author("Nicolas Silva <nical@fastmail.com>")
        .about("Incremental texture atlas layout.")
        .subcommand(
            SubCommand::with_name("init")
            .about("Initialize the layout")
            .arg(size_arg("MIN_WIDTH", "Initial texture width."))
            .arg(size_arg("MIN_HEIGHT", "Initial texture height."))
            .arg(size_arg("MAX_WIDTH", "Maximum texture width."))
            .arg(size_arg("MAX_HEIGHT", "Maximum texture height."))
            .arg(Arg::with_name("POWER_OF_TWO")
                .long("power-of-two")
                .help("Round the texture size up to powers of two.")
                .takes_value(false)
                .required(false)
            )
            .arg(Arg::with_name("NO_ALIGN")
                .long("no-align")
                .help("Don't round element sizes up to multiples of four.")
                .takes_value(false)
                .required(false)
            )
            .arg(atlas_arg())
            .arg(svg_arg())
        )
        .subcommand(
            SubCommand::with_name("add")
            .about("Add an element")
            .arg(size_arg("WIDTH", "Element width."))
            .arg(size_arg("HEIGHT", "Element height."))
            .arg(Arg::with_name("NAME")
                .short("n")
                .long("name")
                .help("Set a name to identify the element.")
                .value_name("NAME")
                .takes_value(true)
                .required(false)
             )
            .arg(atlas_arg())
            .arg(svg_arg())
        )
        .subcommand(
            SubCommand::with_name("remove")
            .about("Remove an element")
            .arg(Arg::with_name("NAME")
                .help("Name of the element to remove.")
                .value_name("NAME")
                .takes_value(true)
                .required(true)
             )
            .arg(atlas_arg())
            .arg(svg_arg())
        )
        .subcommand(
            SubCommand::with_name("svg")
            .about("Dump the layout as SVG")
            .arg(atlas_arg())
            .arg(Arg::with_name("SVG_OUTPUT")
                .help("Output SVG file to use")
                .value_name("FILE")
                .takes_value(true)
                .required(false)
            )
        )
        .subcommand(
            SubCommand::with_name("list")
            .about("List the elements and free regions of the layout")
            .arg(atlas_arg())
        )
        .get_matches();

    if let Some(cmd) = matches.subcommand_matches("init") {
        init(&cmd);
    } else if let Some(cmd) = matches.subcommand_matches("add") {
        add(&cmd);
    } else if let Some(cmd) = matches.subcommand_matches("remove") {
        remove(&cmd);
    } else if let Some(cmd) = matches.subcommand_matches("svg") {
        svg(&cmd);
    } else if let Some(cmd) = matches.subcommand_matches("list") {
        list(&cmd);
    }
}

fn parse_size(args: &ArgMatches, name: &str) -> u32 {
    let value = args.value_of(name).unwrap_or_default();
    value.parse::<u32>().unwrap_or_else(|_| {
        eprintln!("Invalid {}: {:?}.", name, value);
        std::process::exit(1);
    })
}

fn read_session(args: &ArgMatches) -> Session {
    let file_name = args.value_of("ATLAS").unwrap_or("layout.ron");
    let file = OpenOptions::new()
        .read(true)
        .open(file_name)
        .expect(
            "Failed to open the layout file."
        );

    let session: Session = ron::de::from_reader(file).expect("Failed to parse the layout");
    log::debug!("loaded {} elements from {}", session.names.len(), file_name);

    session
}

fn write_session(session: &Session, args: &ArgMatches) {
    let serialized: String = ron::ser::to_string_pretty(
        &session,
        ron::ser::PrettyConfig::default(),
    ).expect("Failed to serialize the layout.");

    let file_name = args.value_of("ATLAS").unwrap_or("layout.ron");
    let mut file = File::create(file_name).expect(
        "Failed to open the layout file."
    );

    file.write_all(serialized.as_bytes()).expect(
        "Failed to write into the layout file."
    );

    log::debug!("saved {} elements to {}", session.names.len(), file_name);
}

fn init(args: &ArgMatches) {
    let min_size = size2(parse_size(args, "MIN_WIDTH"), parse_size(args, "MIN_HEIGHT"));
    let max_size = size2(parse_size(args, "MAX_WIDTH"), parse_size(args, "MAX_HEIGHT"));

    if min_size.width > max_size.width || min_size.height > max_size.height {
        eprintln!("The minimum size must not exceed the maximum size.");
        std::process::exit(1);
    }

    let options = LayoutOptions {
        power_of_two: args.is_present("POWER_OF_TWO"),
        align_by_four: !args.is_present("NO_ALIGN"),
    };

    let session = Session {
        layout: TextureLayout::with_options(min_size, max_size, &options),
        names: HashMap::default(),
        next_id: 0,
    };

    write_session(&session, &args);

    if args.is_present("SVG_OUTPUT") {
        svg(args);
    }
}

fn add(args: &ArgMatches) {
    let mut session = read_session(args);

    let w = parse_size(args, "WIDTH");
    let h = parse_size(args, "HEIGHT");

    let origin = match session.layout.add(size2(w, h)) {
        Ok(origin) => origin,
        Err(err) => {
            eprintln!("Failed to add {}x{} element: {}.", w, h, err);
            return;
        }
    };

    let name = args.value_of("NAME").map(|name| name.to_string()).unwrap_or_else(|| {
        session.next_id += 1;
        format!("#{}", session.next_id)
    });

    println!(
        "Added element {} of size {}x{} at origin [{}, {}], texture size {}x{}",
        name, w, h, origin.x, origin.y, session.layout.width(), session.layout.height(),
    );

    let element = Element { origin, size: size2(w, h) };
    if let Some(old) = session.names.insert(name.clone(), element) {
        println!("Previous element with name {:?} was removed.", name);
        session.layout.remove(old.origin, old.size);
    }

    write_session(&session, args);

    if args.is_present("SVG_OUTPUT") {
        svg(args);
    }
}

fn remove(args: &ArgMatches) {
    let mut session = read_session(args);

    let name = args.value_of("NAME").unwrap_or_default();
    let element = match session.names.remove(name) {
        Some(element) => element,
        None => {
            eprintln!("No element named {:?}.", name);
            return;
        }
    };

    if let Err(err) = remove_element(&mut session.layout, element) {
        eprintln!("Failed to remove {:?}: {}.", name, err);
        return;
    }

    write_session(&session, args);

    if args.is_present("SVG_OUTPUT") {
        svg(args);
    }
}

fn remove_element(layout: &mut TextureLayout, element: Element) -> std::result::Result<(), LayoutError> {
    // Empty elements never took any space in the layout.
    if element.size.is_empty() {
        return Ok(());
    }

    layout.try_remove(element.origin, element.size)
}

fn svg(args: &ArgMatches) {
    let session = read_session(args);

    let svg_file_name = args.value_of("SVG_OUTPUT").unwrap_or("layout.svg");
    let mut svg_file = File::create(svg_file_name).expect(
        "Failed to open the SVG file."
    );

    session.layout.dump_svg(&mut svg_file).expect(
        "Failed to write into the SVG file."
    );
}

fn list(args: &ArgMatches) {
    let session = read_session(args);

    let size = session.layout.size();
    let max_size = session.layout.max_size();
    println!("# Texture size {}x{} (max {}x{})", size.width, size.height, max_size.width, max_size.height);

    println!("# Elements");
    let mut names: Vec<&String> = session.names.keys().collect();
    names.sort();
    for name in names {
        let element = session.names[name];
        println!(
            " - {}: size {}x{} at origin [{}, {}]",
            name, element.size.width, element.size.height, element.origin.x, element.origin.y
        );
    }

    println!("# Free regions");
    session.layout.for_each_free_rectangle(|rect| {
        let size = rect.size();
        println!(" - size {}x{} at origin [{}, {}]", size.width, size.height, rect.min.x, rect.min.y);
    });
}

#[test]
fn remove_empty_element() {
    let mut layout = TextureLayout::new(size2(16, 16), size2(64, 64));
    let size = size2(0, 10);
    let origin = layout.add(size).unwrap();

    assert!(remove_element(&mut layout, Element { origin, size }).is_ok());
    assert!(layout.is_empty());
}

#[test]
fn remove_missing_element() {
    let mut layout = TextureLayout::new(size2(16, 16), size2(64, 64));
    let size = size2(8, 8);
    let origin = layout.add(size).unwrap();

    assert!(remove_element(&mut layout, Element { origin, size }).is_ok());
    assert!(remove_element(&mut layout, Element { origin, size }).is_err());
}
