use std::{
    env,
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use snes::Emulator;

const DEFAULT_FRAMES: usize = 60;

/// `SNES_LOG` takes the usual env_logger filter syntax, e.g. `debug` or
/// `snes::bus=trace`.
fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("SNES_LOG", "warn"))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logger();

    let mut args = env::args().skip(1);
    let mut rom_path: Option<PathBuf> = None;
    let mut frames = DEFAULT_FRAMES;
    let mut fast = false;
    let mut save_state: Option<PathBuf> = None;
    let mut load_state: Option<PathBuf> = None;
    let mut dump_frame: Option<PathBuf> = None;
    let mut sram_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                let Some(value) = args.next() else {
                    eprintln!("--frames requires a value");
                    return Ok(());
                };
                match value.parse::<usize>() {
                    Ok(count) => frames = count,
                    Err(_) => {
                        eprintln!("invalid --frames value: {value}");
                        return Ok(());
                    }
                }
            }
            "--fast" => fast = true,
            "--save-state" | "--load-state" | "--dump-frame" | "--sram" => {
                let Some(path) = args.next() else {
                    eprintln!("{arg} requires a file path");
                    return Ok(());
                };
                let path = Some(PathBuf::from(path));
                match arg.as_str() {
                    "--save-state" => save_state = path,
                    "--load-state" => load_state = path,
                    "--dump-frame" => dump_frame = path,
                    _ => sram_path = path,
                }
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ if rom_path.is_none() => rom_path = Some(PathBuf::from(arg)),
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                return Ok(());
            }
        }
    }

    let Some(rom_path) = rom_path else {
        print_usage();
        return Ok(());
    };

    let rom = fs::read(&rom_path)?;
    let mut emulator = Emulator::new();
    emulator.load_rom(&rom)?;

    if let Some(path) = sram_path.as_ref().filter(|path| path.exists()) {
        match fs::read(path) {
            Ok(bytes) => {
                if let Err(err) = emulator.load_sram(&bytes) {
                    eprintln!("warning: failed to load SRAM from {}: {err}", path.display());
                }
            }
            Err(err) => eprintln!("warning: could not read SRAM file {}: {err}", path.display()),
        }
    }

    if let Some(path) = &load_state {
        emulator.load_state_from_file(path)?;
    }

    for _ in 0..frames {
        if fast {
            emulator.run_frame_fast();
        } else {
            emulator.run_frame();
        }
    }
    // A dumped frame has to be a rendered one.
    if fast && dump_frame.is_some() {
        emulator.run_frame();
    }

    println!(
        "Ran {} frame(s). PC={:06X} A={:04X} X={:04X} Y={:04X} S={:04X}",
        emulator.frame_count(),
        emulator.cpu.program_counter(),
        emulator.cpu.a,
        emulator.cpu.x,
        emulator.cpu.y,
        emulator.cpu.sp,
    );

    if let Some(path) = &dump_frame {
        write_ppm(path, &emulator)?;
    }

    if let Some(path) = &save_state {
        emulator.save_state_to_file(path)?;
    }

    if let Some(path) = &sram_path {
        if !emulator.sram().is_empty() {
            if let Err(err) = fs::write(path, emulator.sram()) {
                eprintln!("warning: failed to write SRAM to {}: {err}", path.display());
            }
        }
    }

    Ok(())
}

fn write_ppm(path: &Path, emulator: &Emulator) -> std::io::Result<()> {
    let (width, height) = emulator.frame_dimensions();
    let mut out = format!("P6\n{width} {height}\n255\n").into_bytes();
    out.reserve(width * height * 3);
    for pixel in emulator.frame_rgba().chunks_exact(4) {
        out.extend_from_slice(&pixel[..3]);
    }
    fs::write(path, out)
}

fn print_usage() {
    eprintln!(
        "Usage: snes <rom.sfc> [--frames N] [--fast] [--save-state FILE] \
         [--load-state FILE] [--dump-frame FILE.ppm] [--sram FILE]"
    );
}
