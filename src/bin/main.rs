// sprout-os entry point and main loop
//
// Boot sequence: timer -> hardware -> config from EEPROM -> LCD -> kernel
// Main loop: drain scheduler -> WFI -> translate wake flags -> repeat
//
// A 1ms timer drives every activity through the TaskTable. The button
// and the ultrasonic echo raise their own wake flags from the GPIO
// interrupt so a press or a finished measurement is handled without
// waiting for the next scheduled scan.
//
// Input routing lives in the kernel's Controller; this loop only moves
// bytes between it and the hardware and applies the Effects it returns.

#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::time::Duration;
use esp_hal::timer::PeriodicTimer;
use esp_hal::timer::timg::TimerGroup;
use log::{debug, error, info, warn};

use core::cell::RefCell;
use critical_section::Mutex;

use sprout_kernel::blink::{self, Blinker};
use sprout_kernel::clock::{self, signal_timer, take_echo, try_wake};
use sprout_kernel::config::ConfigStore;
use sprout_kernel::controller::Controller;
use sprout_kernel::eeprom::{self, At24c32};
use sprout_kernel::input::Button;
use sprout_kernel::keypad::{self, Keypad, Pcf8574Keypad};
use sprout_kernel::lcd::{self, Lcd, LineCache};
use sprout_kernel::poll::{AdaptivePoller, PollRate};
use sprout_kernel::ranging::{MedianFilter, RangeFinder, Reading};
use sprout_kernel::segment::{OutputFrame, SegmentDisplay};
use sprout_kernel::sensors::Smoother;
use sprout_kernel::{Job, Scheduler, TaskTable};

use sprout_os::board::Board;
use sprout_os::board::irq::micros;

esp_bootloader_esp_idf::esp_app_desc!();

const TICK_MS: u64 = 1;
const MEDIAN_WINDOW: usize = 5;
const LIGHT_SMOOTHING: u32 = 2;

static TIMER0: Mutex<RefCell<Option<PeriodicTimer<'static, esp_hal::Blocking>>>> =
    Mutex::new(RefCell::new(None));

#[esp_hal::handler(priority = esp_hal::interrupt::Priority::Priority1)]
fn timer0_handler() {
    critical_section::with(|cs| {
        if let Some(timer) = TIMER0.borrow_ref_mut(cs).as_mut() {
            timer.clear_interrupt();
        }
    });
    signal_timer();
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    info!("booting...");

    let timg0 = TimerGroup::new(unsafe { peripherals.TIMG0.clone_unchecked() });
    let mut timer0 = PeriodicTimer::new(timg0.timer0);
    critical_section::with(|cs| {
        timer0.set_interrupt_handler(timer0_handler);
        timer0.start(Duration::from_millis(TICK_MS)).unwrap();
        timer0.listen();
        TIMER0.borrow_ref_mut(cs).replace(timer0);
    });
    info!("timer initialized.");

    let board = Board::init(peripherals);
    let mut delay = Delay::new();

    // every I2C device gets its own handle on the shared bus
    let mut eeprom = At24c32::new(board.i2c_device(), Delay::new(), eeprom::DEFAULT_ADDRESS);
    let mut lcd = Lcd::new(board.i2c_device(), lcd::DEFAULT_ADDRESS);
    let mut keypad = Keypad::new(Pcf8574Keypad::new(
        board.i2c_device(),
        keypad::DEFAULT_ADDRESS,
    ));
    let Board {
        mut sensors,
        mut outputs,
        button,
        ..
    } = board;
    info!("hardware initialized.");

    let store = ConfigStore::default();
    let cfg = store.load(&mut eeprom);
    info!(
        "config: alarm {}-{}cm, relock {}s, door {} steps @ {} st/s",
        cfg.near_cm, cfg.far_cm, cfg.relock_secs, cfg.door_steps, cfg.motor_speed
    );

    if let Err(e) = lcd.init(&mut delay) {
        warn!("lcd: {}", e);
    }
    let mut lines = LineCache::new();

    let mut button = Button::new(button);
    let mut ctl = Controller::new(cfg, clock::now());
    let mut ranger = RangeFinder::new();
    let mut median = MedianFilter::<MEDIAN_WINDOW>::new();

    let mut led = Blinker::new(blink::HEARTBEAT);
    let mut digits = SegmentDisplay::<4>::new();
    digits.show_text("----");
    let mut frame = OutputFrame::new();

    let mut light = Smoother::<LIGHT_SMOOTHING>::new();
    let mut light_mv: u16 = 0;

    let mut poller = AdaptivePoller::new();
    let mut tasks = TaskTable::new();
    let mut sched = Scheduler::new();

    // the motor only needs its 1ms slot while the door moves
    tasks.set_enabled(Job::StepMotor, false, clock::now());
    let _ = outputs.chain.show(&frame);
    info!("kernel ready.");

    loop {
        // drain all pending jobs by priority (high first, FIFO within tier)
        while let Some(job) = sched.pop() {
            let now = clock::now();
            match job {
                Job::MuxDisplay => {
                    let (segments, mask) = digits.next_frame();
                    frame.segments = segments;
                    frame.digits = mask;
                    let _ = outputs.chain.show(&frame);
                }

                Job::StepMotor => {
                    // the step clock wraps every ~71 min; Ramp compares with wrapping_sub
                    if let Some(coils) = ctl.step_motor(micros() as u32) {
                        frame.coils = coils;
                        let _ = outputs.chain.show(&frame);
                    }
                    if ctl.motor_parked() {
                        tasks.set_enabled(Job::StepMotor, false, now);
                    }
                }

                Job::ScanInputs => {
                    let mut activity = false;

                    if let Some(ev) = button.poll(now) {
                        activity = true;
                        ctl.on_button(ev, now).apply(&mut tasks, &mut sched, now);
                    }

                    if let Some(ev) = keypad.poll(now) {
                        activity = true;
                        ctl.on_key(ev, now).apply(&mut tasks, &mut sched, now);
                    }

                    if activity || keypad.is_active() || button.is_debouncing() {
                        let was = poller.rate();
                        poller.on_activity();
                        if was != PollRate::Fast {
                            tasks.set_interval(Job::ScanInputs, poller.interval_ms());
                            debug!("input: scan {}", poller.rate());
                        }
                    } else if poller.on_idle() {
                        tasks.set_interval(Job::ScanInputs, poller.interval_ms());
                        debug!("input: scan {}", poller.rate());
                    }
                }

                Job::SampleRange => {
                    if ranger.trigger(now) {
                        sensors.pulse_trig(&delay);
                    }
                }

                Job::UpdateAlarm => {
                    if let Some(reading) = ranger.poll(take_echo(), now) {
                        let reading = match reading {
                            Reading::Distance(cm) => Reading::Distance(median.push(cm)),
                            Reading::OutOfRange => Reading::OutOfRange,
                        };
                        let alarm = ctl.alarm_mut();
                        alarm.update(reading);
                        match alarm.distance() {
                            Some(cm) => digits.show_number(cm as i32),
                            None => {
                                median.clear();
                                digits.show_text("----");
                            }
                        }
                    }
                    if ctl.alarm_mut().buzzer(now) {
                        outputs.buzzer.set_high();
                    } else {
                        outputs.buzzer.set_low();
                    }
                }

                Job::UpdateIndicators => {
                    led.set_pattern(ctl.blink_pattern(), now);
                    if let Some(on) = led.poll(now) {
                        if on {
                            outputs.status_led.set_high();
                        } else {
                            outputs.status_led.set_low();
                        }
                    }
                    frame.leds = ctl.leds();
                }

                Job::SecurityTick => {
                    ctl.tick(now).apply(&mut tasks, &mut sched, now);
                }

                Job::ReadLight => {
                    light_mv = light.push(sensors.read_light_mv());
                }

                Job::RefreshLcd => {
                    let snap = ctl.snapshot(now, light_mv);
                    for (row, line) in ctl.dashboard().render(&snap).iter().enumerate() {
                        if !lines.changed(row, line.as_str()) {
                            continue;
                        }
                        if let Err(e) = lcd.write_line(row as u8, line.as_str()) {
                            warn!("lcd: {}", e);
                            // repaint everything once the bus recovers
                            lines.invalidate();
                            break;
                        }
                    }
                }

                Job::SaveConfig => {
                    if let Err(e) = store.save(&mut eeprom, ctl.config()) {
                        error!("config: save failed: {}", e);
                    }
                }
            }
        }

        // wait for wake event then translate flags into jobs
        let wake = match try_wake() {
            Some(w) => w,
            None => {
                clock::wait_for_interrupt();
                continue;
            }
        };

        if wake.timer {
            tasks.schedule(clock::now(), &mut sched);
        }

        if wake.button {
            let was = poller.rate();
            poller.on_activity();
            if was != PollRate::Fast {
                tasks.set_interval(Job::ScanInputs, poller.interval_ms());
                info!("input: scan {} (button wake)", poller.rate());
            }
            let _ = sched.push_unique(Job::ScanInputs);
        }

        if wake.echo {
            let _ = sched.push_unique(Job::UpdateAlarm);
        }
    }
}
