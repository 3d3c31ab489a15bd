use charlcd_gpio::delay::{delay_for, DelayNs, SpinDelay};
use charlcd_gpio::gpiod::GpiodDriver;
use charlcd_gpio::lcd::hd44780::driver::{
    CursorDirection, GpioHD44780Driver, HD44780Driver, HD44780PrintExt,
};
use charlcd_gpio::lcd::hd44780::emulator::HD44780Emulator;
use charlcd_gpio::mock::MockGpioDriver;
use charlcd_gpio::wiring::{Backend, Wiring};
use dotenv::dotenv;
use log::{debug, info};
use std::fmt::Write;
use std::time::Duration;
use sysinfo::System;

const STEP: Duration = Duration::from_secs(2);

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!("Architecture {}", System::cpu_arch());

    let wiring = Wiring::from_env()?;
    info!(
        "LCD @ RS: {}, RW: {}, E: {}, Data: {:?} ({:?})",
        wiring.pins.rs,
        wiring.pins.rw,
        wiring.pins.e,
        wiring.pins.data.as_slice().iter().map(ToString::to_string).collect::<Vec<_>>(),
        wiring.pins.mode(),
    );

    match wiring.backend {
        Backend::Gpiod => {
            debug!("Initializing GPIO driver...");
            let gpio = GpiodDriver::open(&wiring.chips)?;
            debug!("Initializing LCD driver...");
            let mut lcd = GpioHD44780Driver::init(&gpio, SpinDelay::new(), wiring.pins)?;
            debug!("{:?} initialized.", lcd);

            run(&mut lcd, &mut SpinDelay::new())?;
        }
        Backend::Mock => {
            let (ports, pins) = wiring.mock_size();
            let gpio = MockGpioDriver::new(ports, pins);
            let mut lcd = GpioHD44780Driver::init(&gpio, gpio.delay(), wiring.pins)?;
            run(&mut lcd, &mut gpio.delay())?;

            let mut emulator = HD44780Emulator::new(wiring.pins);
            emulator.feed_all(&gpio.events());
            let [row1, row2] = emulator.lines();
            info!("Emulated panel after {} transfers:", emulator.transfers().len());
            info!("+----------------+");
            info!("|{}|", row1);
            info!("|{}|", row2);
            info!("+----------------+");
            debug!("{:?}", emulator.state());
        }
    }

    info!("Done.");
    Ok(())
}

/// Walks through the features of the display, pausing after each step.
fn run<D: DelayNs>(
    lcd: &mut GpioHD44780Driver<'_, D>,
    pause: &mut impl DelayNs,
) -> eyre::Result<()> {
    info!("Greeting...");
    lcd.clear_display()?;
    lcd.print("Hello, HD44780!")?;
    lcd.move_to_row2()?;
    lcd.print(concat!("v.", env!("CARGO_PKG_VERSION")))?;
    delay_for(pause, STEP);

    info!("Numbers...");
    lcd.clear_display()?;
    lcd.print("b")?;
    lcd.print_binary8(0b10110000)?;
    lcd.print(" h")?;
    lcd.print_hex8(0xAF)?;
    lcd.move_to_row2()?;
    lcd.print("h")?;
    lcd.print_hex32(0xDEADBEEF)?;
    write!(lcd, " {:>5}", -42)?;
    delay_for(pause, STEP);

    info!("Cursor modes...");
    for name in ["Cursor off", "Cursor on", "Cursor blink"] {
        lcd.clear_display()?;
        lcd.print(name)?;
        match name {
            "Cursor off" => lcd.cursor_off()?,
            "Cursor on" => lcd.cursor_on()?,
            _ => lcd.cursor_blink()?,
        }
        delay_for(pause, STEP);
    }

    info!("Scrolling...");
    lcd.clear_display()?;
    lcd.print("<- scrolling")?;
    for _ in 0..4 {
        lcd.scroll_display(CursorDirection::Right)?;
        delay_for(pause, STEP / 4);
    }
    lcd.return_home()?;

    info!("Custom characters...");
    const BELL: [u8; 8] = [
        0b00100, 0b01110, 0b01110, 0b01110, 0b11111, 0b00000, 0b00100, 0b00000,
    ];
    lcd.create_char(0, &BELL)?;
    lcd.clear_display()?;
    lcd.print("Ding ")?;
    lcd.print_bytes(&[0])?;
    lcd.set_cursor(1, 11)?;
    lcd.print("Done")?;
    lcd.cursor_off()?;

    Ok(())
}
