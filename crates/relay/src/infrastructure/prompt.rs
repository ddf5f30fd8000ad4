//! Interactive device selection for the console variant.
//!
//! Lists the enumerated adapters, then asks the operator to type a device
//! name. Runs before any port is opened or any loop started.

use std::io::{self, BufRead, Write};

use super::serial::{list_ports, PortListing};

/// Writes one line per adapter, or a notice when there are none.
pub fn print_listing(out: &mut impl Write, ports: &[PortListing]) -> io::Result<()> {
    if ports.is_empty() {
        writeln!(out, "no serial ports found")?;
    }
    for port in ports {
        writeln!(out, "{port}")?;
    }
    Ok(())
}

/// Asks for a device name and reads one line.
///
/// Returns `None` at end of input or when the answer is blank.
pub fn prompt_device(input: &mut impl BufRead, out: &mut impl Write) -> io::Result<Option<String>> {
    write!(out, "Enter the serial port to use: ")?;
    out.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(None);
    }
    let answer = answer.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}

/// Lists the system's ports on stdout and prompts on stdin.
///
/// Enumeration failure is reported to the operator but does not prevent
/// typing a device name by hand.
pub fn choose_device() -> io::Result<Option<String>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match list_ports() {
        Ok(ports) => print_listing(&mut out, &ports)?,
        Err(e) => writeln!(out, "{e}")?,
    }
    prompt_device(&mut io::stdin().lock(), &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_print_listing_writes_one_line_per_port() {
        // Arrange
        let ports = vec![
            PortListing {
                device: "COM20".into(),
                name: "CP2102".into(),
                location: "usb 10c4:ea60".into(),
                description: "Silicon Labs".into(),
            },
            PortListing {
                device: "COM21".into(),
                name: "serial".into(),
                location: String::new(),
                description: String::new(),
            },
        ];
        let mut out = Vec::new();

        // Act
        print_listing(&mut out, &ports).unwrap();

        // Assert
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "COM20 CP2102 usb 10c4:ea60 Silicon Labs");
        assert!(lines[1].starts_with("COM21 serial"));
    }

    #[test]
    fn test_print_listing_reports_empty_system() {
        let mut out = Vec::new();
        print_listing(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "no serial ports found\n");
    }

    #[test]
    fn test_prompt_device_trims_answer() {
        let mut input = Cursor::new(b"  /dev/ttyUSB0 \r\n".to_vec());
        let mut out = Vec::new();

        let device = prompt_device(&mut input, &mut out).unwrap();

        assert_eq!(device.as_deref(), Some("/dev/ttyUSB0"));
        assert!(String::from_utf8(out).unwrap().contains("serial port"));
    }

    #[test]
    fn test_prompt_device_blank_or_eof_is_none() {
        let mut out = Vec::new();
        assert_eq!(
            prompt_device(&mut Cursor::new(b"\n".to_vec()), &mut out).unwrap(),
            None
        );
        assert_eq!(
            prompt_device(&mut Cursor::new(Vec::new()), &mut out).unwrap(),
            None
        );
    }
}
