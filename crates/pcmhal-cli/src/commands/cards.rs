//! Card listing command.

use clap::Args;
use pcmhal_core::{Direction, PcmInfo};
use pcmhal_io::{CardEnumerator, CpalDriver, ProcAsound, StaticCards};

use super::common::Global;

#[derive(Args)]
pub struct CardsArgs {
    /// Also list the devices the cpal host reports
    #[arg(long)]
    host: bool,
}

pub fn run(global: &Global, args: CardsArgs) -> anyhow::Result<()> {
    let cards = if global.sim {
        StaticCards::single(0).list()
    } else {
        ProcAsound::default().list()
    };

    if cards.is_empty() {
        println!("No PCM nodes found.");
    } else {
        print_direction("Playback", &cards, Direction::Output);
        print_direction("Capture", &cards, Direction::Input);
    }

    if args.host && !global.sim {
        let driver = CpalDriver::new();
        println!("Host Devices");
        println!("============\n");
        for (label, direction) in [("Output", Direction::Output), ("Input", Direction::Input)] {
            println!("{label}:");
            for name in driver.device_names(direction)? {
                println!("  {name}");
            }
            println!();
        }
    }
    Ok(())
}

fn print_direction(label: &str, cards: &[PcmInfo], direction: Direction) {
    let nodes: Vec<_> = cards.iter().filter(|c| c.direction == direction).collect();
    if nodes.is_empty() {
        return;
    }
    println!("{label} Nodes:");
    for info in nodes {
        let hdmi = if info.is_hdmi() { " [hdmi]" } else { "" };
        println!("  {:<10} {}{}", info.node_name(), info.name, hdmi);
    }
    println!();
}
