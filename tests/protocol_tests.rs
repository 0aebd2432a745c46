//! Line protocol scenarios against a shared drive

use std::sync::Arc;

use vfd_sim::hal::MockTransport;
use vfd_sim::protocol::{CommandProtocol, ProtocolSession};
use vfd_sim::services::{LineReader, ReaderExit, SharedDrive};
use vfd_sim::{AlarmCode, DriveConfig, DriveEngine, COMMANDS};

fn shared() -> Arc<SharedDrive> {
    let engine = DriveEngine::new(DriveConfig::default().noiseless().with_seed(7)).unwrap();
    Arc::new(SharedDrive::new(engine))
}

fn tick(drive: &SharedDrive, n: usize) {
    for _ in 0..n {
        drive.with_engine(|engine| engine.tick(0.1)).unwrap();
    }
}

fn status_field<'a>(status: &'a str, key: &str) -> &'a str {
    status
        .split("\r\n")
        .find_map(|line| line.strip_prefix(key)?.strip_prefix(": "))
        .unwrap_or_else(|| panic!("{key} missing from {status:?}"))
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn freq_run_then_status_converges() {
    let drive = shared();
    let protocol = CommandProtocol::new(Arc::clone(&drive));

    assert_eq!(
        protocol.handle_line("FREQ 50.0").render(),
        "OK: Frequenza impostata a 50.0 Hz\r\n"
    );
    assert_eq!(protocol.handle_line("RUN").render(), "OK\r\n");

    let mut converged = false;
    for _ in 0..60 {
        tick(&drive, 1);
        let status = protocol.handle_line("STATUS").render();
        let freq: f64 = status_field(&status, "FREQUENZA")
            .trim_end_matches(" Hz")
            .parse()
            .unwrap();
        if (freq - 50.0).abs() <= 0.1 {
            converged = true;
            assert_eq!(status_field(&status, "STATO"), "IN_MARCIA");
            break;
        }
    }
    assert!(converged);
}

#[test]
fn overcurrent_trip_reported_in_status() {
    let drive = shared();
    let protocol = CommandProtocol::new(Arc::clone(&drive));
    protocol.handle_line("FREQ 30");
    protocol.handle_line("RUN");
    tick(&drive, 5);

    drive.with_engine(|e| e.simulate_current(25.0)).unwrap();
    tick(&drive, 1);

    let status = protocol.handle_line("STATUS").render();
    assert_eq!(status_field(&status, "STATO"), "ALLARME");
    assert_eq!(status_field(&status, "FREQUENZA"), "0.0 Hz");
    assert_eq!(
        status_field(&status, "ALLARME"),
        "Sovracorrente: 25.0A > 15.0A"
    );
    assert_eq!(
        protocol.handle_line("RUN").render(),
        "ERR: Impossibile avviare l'inverter\r\n"
    );
}

fn tripped_status(temperature: f64, alarm: &str) -> String {
    format!(
        "=== STATO INVERTER ===\r\n\
         STATO: ALLARME\r\n\
         FREQUENZA: 0.0 Hz\r\n\
         TENSIONE: 400.0 V\r\n\
         CORRENTE: 0.00 A\r\n\
         VELOCITA: 0 RPM\r\n\
         TEMPERATURA: {temperature:.1} C\r\n\
         DIREZIONE: AVANTI\r\n\
         ALLARME: {alarm}\r\n\
         ===================\r\n"
    )
}

#[test]
fn injected_fault_shows_standstill_outputs() {
    let drive = shared();
    let protocol = CommandProtocol::new(Arc::clone(&drive));
    protocol.handle_line("FREQ 50");
    protocol.handle_line("RUN");
    tick(&drive, 55);
    assert!(drive.snapshot().motor_speed > 1000.0);

    drive.with_engine(|e| e.inject_fault(AlarmCode::HardwareFault, None));
    let s = drive.snapshot();
    assert_eq!(s.torque, 0.0);
    assert_eq!(s.output_power, 0.0);
    assert_eq!(
        protocol.handle_line("STATUS").render(),
        tripped_status(s.temperature, "Guasto hardware")
    );
}

#[test]
fn tick_trip_shows_standstill_outputs() {
    let drive = shared();
    let protocol = CommandProtocol::new(Arc::clone(&drive));
    protocol.handle_line("FREQ 50");
    protocol.handle_line("RUN");
    tick(&drive, 60);

    drive.with_engine(|e| e.simulate_current(22.5)).unwrap();
    tick(&drive, 1);
    let s = drive.snapshot();
    assert_eq!(s.torque, 0.0);
    assert_eq!(s.output_power, 0.0);
    assert_eq!(
        protocol.handle_line("STATUS").render(),
        tripped_status(s.temperature, "Sovracorrente: 22.5A > 15.0A")
    );
}

#[test]
fn reset_with_persisting_condition() {
    let drive = shared();
    let protocol = CommandProtocol::new(Arc::clone(&drive));
    protocol.handle_line("FREQ 20");
    protocol.handle_line("RUN");
    tick(&drive, 2);
    drive.with_engine(|e| e.simulate_current(25.0)).unwrap();
    tick(&drive, 1);

    assert_eq!(protocol.handle_line("RST").render(), "OK\r\n");
    tick(&drive, 3);
    let status = protocol.handle_line("STATUS").render();
    assert_eq!(status_field(&status, "STATO"), "PRONTO");
    assert_eq!(status_field(&status, "ALLARME"), "Nessuno");

    assert_eq!(protocol.handle_line("RUN").render(), "OK\r\n");
    tick(&drive, 1);
    let status = protocol.handle_line("STATUS").render();
    assert_eq!(status_field(&status, "STATO"), "ALLARME");

    drive.with_engine(|e| e.clear_simulated_conditions());
    assert_eq!(protocol.handle_line("RST").render(), "OK\r\n");
    assert_eq!(protocol.handle_line("RUN").render(), "OK\r\n");
    tick(&drive, 5);
    assert!(drive.snapshot().running);
}

#[test]
fn reversal_through_protocol() {
    let drive = shared();
    let protocol = CommandProtocol::new(Arc::clone(&drive));
    protocol.handle_line("FREQ 10");
    protocol.handle_line("RUN");
    tick(&drive, 12);

    assert_eq!(
        protocol.handle_line("DIR -1").render(),
        "OK: Direzione impostata a indietro\r\n"
    );
    let status = protocol.handle_line("STATUS").render();
    assert_eq!(status_field(&status, "STATO"), "DECELERAZIONE");
    assert_eq!(status_field(&status, "DIREZIONE"), "AVANTI");

    tick(&drive, 10);
    let status = protocol.handle_line("STATUS").render();
    assert_eq!(status_field(&status, "DIREZIONE"), "INDIETRO");
    assert_eq!(status_field(&status, "STATO"), "ACCELERAZIONE");

    tick(&drive, 12);
    let status = protocol.handle_line("STATUS").render();
    assert_eq!(status_field(&status, "STATO"), "IN_MARCIA");
    assert_eq!(status_field(&status, "FREQUENZA"), "10.0 Hz");
}

#[test]
fn help_lists_every_command() {
    let protocol = CommandProtocol::new(shared());
    let help = protocol.handle_line("HELP").render();
    let lines: Vec<&str> = help.split("\r\n").collect();
    assert_eq!(lines[0], "=== COMANDI DISPONIBILI ===");
    for spec in &COMMANDS {
        assert!(
            lines.iter().any(|l| l.starts_with(&format!("{}: ", spec.keyword))),
            "{} missing",
            spec.keyword
        );
    }
    assert!(lines.contains(&"Esempi:"));
    assert_eq!(lines[lines.len() - 2], "=========================");
    assert_eq!(lines[lines.len() - 1], "");
}

// ============================================================================
// Error Replies
// ============================================================================

#[test]
fn every_error_reply() {
    let protocol = CommandProtocol::new(shared());
    let cases = [
        ("FOO", "ERR: Comando non riconosciuto"),
        ("FREQ", "ERR: Formato non valido. Usa: FREQ <valore>"),
        ("FREQ abc", "ERR: Valore non valido"),
        ("FREQ 51", "ERR: Frequenza fuori range (0-50.0 Hz)"),
        (
            "DIR 0",
            "ERR: Formato non valido. Usa: DIR 1 (avanti) o DIR -1 (indietro)",
        ),
        ("STATUS now", "ERR: Formato non valido. Usa: STATUS"),
        ("STOP", "ERR: Impossibile fermare l'inverter"),
        ("FREQ -0", "OK: Frequenza impostata a 0.0 Hz"),
    ];
    for (line, reply) in cases {
        assert_eq!(protocol.handle_line(line).render(), format!("{reply}\r\n"), "{line}");
    }
}

#[test]
fn injected_fault_blocks_run_until_reset() {
    let drive = shared();
    let protocol = CommandProtocol::new(Arc::clone(&drive));
    drive.with_engine(|e| e.inject_fault(AlarmCode::Communication, None));

    let status = protocol.handle_line("STATUS").render();
    assert_eq!(status_field(&status, "ALLARME"), "Errore di comunicazione");
    assert!(protocol.handle_line("RUN").is_error());
    protocol.handle_line("RST");
    assert!(!protocol.handle_line("RUN").is_error());
}

// ============================================================================
// Over a Transport
// ============================================================================

#[test]
fn reader_answers_fragmented_input() {
    let drive = shared();
    let transport = MockTransport::new();
    transport.queue_input("fr");
    transport.queue_input("eq 12.5\r");
    transport.queue_input("\nrun\n");
    transport.queue_input(vec![b'X'; 400]);
    transport.queue_input("\nstatus\r\n");
    transport.hang_up();

    let reader = LineReader::spawn(transport.clone(), Arc::clone(&drive)).unwrap();
    let summary = reader.join();
    assert_eq!(summary.exit, ReaderExit::Closed);
    assert_eq!(summary.lines, 4);

    let out = transport.output_text();
    assert!(out.starts_with(
        "OK: Frequenza impostata a 12.5 Hz\r\nOK\r\nERR: Riga troppo lunga\r\n=== STATO INVERTER ===\r\n"
    ));
    assert!(out.ends_with("===================\r\n"));
    assert!(drive.snapshot().running);
}

#[test]
fn independent_sessions_share_one_drive() {
    let drive = shared();
    let mut a = ProtocolSession::new(Arc::clone(&drive));
    let mut b = ProtocolSession::new(Arc::clone(&drive));

    assert_eq!(a.feed(b"FREQ 5\n"), "OK: Frequenza impostata a 5.0 Hz\r\n");
    // b holds a partial line; a's traffic does not disturb it
    assert_eq!(b.feed(b"RU"), "");
    assert_eq!(a.feed(b"STATUS\n").lines().nth(1), Some("STATO: PRONTO"));
    assert_eq!(b.feed(b"N\n"), "OK\r\n");
    assert_eq!(a.feed(b"RUN\n"), "ERR: Impossibile avviare l'inverter\r\n");
}
