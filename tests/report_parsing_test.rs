use chrono::{DateTime, TimeZone, Utc};
use cs_daq::parameter::ParameterId;
use cs_daq::report::{CsvFormat, Reading, MISSING_TEXT};

const FULL_REPORT: &str = "SYSTEM:PRINT?\r\n\
MJD 60123   14:05:33\r\n\
\r\n\
Freq Offset:     +1.2E-13        Osc. control:    45.3 %\r\n\
RF amplitude 1:  24.5 %          RF amplitude 2:  24.6 %\r\n\
Zeeman Freq:     40012 Hz        C-field curr:    12.345 mA\r\n\
E-multiplier:    1450 V          Signal Gain:     22.1 %\r\n\
CBT Oven:        8.9 V           CBT Oven Err:    0.05 oC\r\n\
Osc. Oven:       -4.7 V          Ion Pump:        0.1 uA\r\n\
HW Ionizer:      0.5 V           Mass spec:       10.5 V\r\n\
SAW Tuning:      5.5 V           DRO Tuning:      7.7 V\r\n\
87MHz PLL:       3.3 V           uP Clock PLL:    2.2 V\r\n\
+12V supply:     12.1 V          -12V supply:     -12.2 V\r\n\
+5V supply:      5.1 V           Thermometer:     31.2 oC\r\n\
CBT ID: CBT047\r\n\
Status summary: Operating normally\r\n\
Power source: AC\r\n\
Log status: Empty\r\n";

fn captured() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 7, 1, 14, 5, 30).unwrap()
}

#[test]
fn full_report_populates_every_field() {
    let reading = Reading::parse(FULL_REPORT, captured());

    assert_eq!(reading.internal_mjd(), Some(60123));
    assert_eq!(reading.internal_time(), "14:05:33");
    assert_eq!(reading.cbt_id(), "CBT047");
    assert_eq!(reading.status_summary(), "Operating normally");
    assert_eq!(reading.power_source(), "AC");
    assert_eq!(reading.log_status(), "Empty");

    let expected = [
        (ParameterId::FrequencyOffset, 1.2e-13),
        (ParameterId::OscillatorControl, 45.3),
        (ParameterId::RfAmplitude1, 24.5),
        (ParameterId::RfAmplitude2, 24.6),
        (ParameterId::ZeemanFrequency, 40012.0),
        (ParameterId::CFieldCurrent, 12.345),
        (ParameterId::EMultiplier, 1450.0),
        (ParameterId::SignalGain, 22.1),
        (ParameterId::CbtOven, 8.9),
        (ParameterId::CbtOvenError, 0.05),
        (ParameterId::OscillatorOven, -4.7),
        (ParameterId::IonPump, 0.1),
        (ParameterId::HwIonizer, 0.5),
        (ParameterId::MassSpec, 10.5),
        (ParameterId::SawTuning, 5.5),
        (ParameterId::DroTuning, 7.7),
        (ParameterId::Mhz87Pll, 3.3),
        (ParameterId::UpClockPll, 2.2),
        (ParameterId::P12VSupply, 12.1),
        (ParameterId::M12VSupply, -12.2),
        (ParameterId::P5VSupply, 5.1),
        (ParameterId::Thermometer, 31.2),
    ];
    for (id, value) in expected {
        assert_eq!(reading.value(id), value, "{:?}", id);
    }
}

#[test]
fn full_report_renders_fixed_columns_and_precision() {
    let reading = Reading::parse(FULL_REPORT, captured());
    let row = reading.to_csv_row(&CsvFormat::default());
    let cells: Vec<&str> = row.split(',').collect();

    assert_eq!(
        cells,
        vec![
            "2023.07.01/14:05:30",
            "60123",
            "14:05:33",
            "CBT047",
            "Operating normally",
            "AC",
            "Empty",
            "1.2E-13",
            "45.30",
            "24.5",
            "24.6",
            "40012",
            "12.345",
            "1450",
            "22.1",
            "8.9",
            "0.05",
            "-4.7",
            "0.1",
            "0.5",
            "10.5",
            "5.5",
            "7.7",
            "3.3",
            "2.2",
            "12.1",
            "-12.2",
            "5.1",
            "31.2",
        ]
    );
}

#[test]
fn header_and_row_have_the_same_width() {
    let format = CsvFormat::new('\t').unwrap();
    for raw in ["", FULL_REPORT, "CBT ID: 1\nnonsense"] {
        let reading = Reading::parse(raw, captured());
        let header = reading.csv_header_row(&format);
        let row = reading.to_csv_row(&format);
        assert_eq!(header.split('\t').count(), row.split('\t').count());
        assert_eq!(header.split('\t').count(), 7 + ParameterId::ALL.len());
    }
}

#[test]
fn header_titles() {
    let reading = Reading::parse("", captured());
    let header = reading.csv_header_fields();
    assert_eq!(header[0], "Time stamp");
    assert_eq!(header[7], "Freq Offset / ");
    assert_eq!(header[8], "Osc. control / %");
    assert_eq!(header[12], "C-field curr / mA");
}

#[test]
fn identification_echo_only_yields_defaults() {
    let reading = Reading::parse("*IDN?\r\nHEWLETT-PACKARD,5071A,US1234,1.0\r\n", captured());
    assert!(reading.parameters().iter().all(|p| p.value().is_nan()));
    assert_eq!(reading.parameters().len(), ParameterId::ALL.len());
    for text in [
        reading.internal_time(),
        reading.cbt_id(),
        reading.status_summary(),
        reading.power_source(),
        reading.log_status(),
    ] {
        assert_eq!(text, MISSING_TEXT);
    }
    assert_eq!(reading.internal_mjd(), None);
}

#[test]
fn repeated_key_last_match_wins() {
    let raw = "Ion Pump: 1 Thermometer: 30.0\nSignal Gain: 2 Thermometer: 31.5 oC";
    let reading = Reading::parse(raw, captured());
    assert_eq!(reading.value(ParameterId::Thermometer), 31.5);
}

#[test]
fn reading_is_stamped_with_caller_clock() {
    let reading = Reading::parse(FULL_REPORT, captured());
    assert_eq!(reading.captured_at(), captured());
}
