// 离线回放：把 socat 抓下来的原始字节流喂给取帧器，重建 Plant 并打印摘要
// 抓包方式：
//   socat -x -r binfile TCP-LISTEN:8899 TCP:host:8899   # 中间人
//   socat -x -u TCP:host:8899 CREATE:binfile            # 旁听

use std::fs::File;
use std::io::Read;

use anyhow::{bail, Context, Result};
use log::debug;

use givenergy_modbus::framer::Framer;
use givenergy_modbus::model::plant::Plant;

fn main() -> Result<()> {
    env_logger::init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => bail!("usage: replay <capture-file>"),
    };
    let mut file = File::open(&path).with_context(|| format!("opening {}", path))?;

    let mut framer = Framer::client();
    let mut plant = Plant::new();
    let mut chunk = [0u8; 300];
    let mut messages = 0usize;

    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        for pdu in framer.feed(&chunk[..n]) {
            debug!("processing {:?}", pdu);
            plant.update(&pdu);
            messages += 1;
        }
    }

    println!(
        "decoded {} messages ({} bytes left unframed)",
        messages,
        framer.pending()
    );

    let inverter = plant.inverter();
    println!(
        "inverter {} ({:?}, firmware {})",
        inverter.serial_number(),
        inverter.model(),
        inverter.firmware_version()
    );
    println!(
        "  status {:?}, battery {}%, reserve {}%, charge target {}%",
        inverter.status(),
        inverter.battery_percent(),
        inverter.battery_soc_reserve(),
        inverter.charge_target_soc()
    );
    if let Some(slot) = inverter.charge_slot_1() {
        println!("  charge slot 1: {}", slot);
    }

    println!("batteries: {}", plant.number_batteries);
    for (i, battery) in plant.batteries().iter().enumerate() {
        println!(
            "  battery {}: {} soc {}% ({} cells, {:.2} Ah remaining)",
            i,
            battery.serial_number(),
            battery.soc(),
            battery.num_cells(),
            battery.cap_remaining()
        );
    }

    Ok(())
}
