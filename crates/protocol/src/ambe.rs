//! AMBE-Bitfeld-Extraktor
//!
//! Ein Voice-Burst traegt drei AMBE-Subframes zu je 49 Bit in einem
//! 19-Byte-Fenster ab Frame-Offset 33. Die Subframes beginnen bei Bit 0, 50
//! und 100 des Fensters und liegen nie byte-aligned.
//!
//! Jeder Subframe wird Bit fuer Bit in einen 7-Byte-Block kopiert (MSB zuerst,
//! die 7 ungenutzten Bits am Ende des Blocks sind Null). Die drei Bloecke
//! ergeben zusammen die 21 Bytes, die das Vocoder-Gateway erwartet.
//!
//! ```text
//! Fenster-Bit  0            49 50           99 100          149    151
//!              |--- AMBE 1 ---|x|--- AMBE 2 ---|x|--- AMBE 3 ---|xx|
//! ```

use dmrlink_core::{DmrlinkError, Result};

/// Frame-Offset des AMBE-Fensters
pub const AMBE_FENSTER_OFFSET: usize = 33;

/// Laenge des AMBE-Fensters in Bytes
pub const AMBE_FENSTER_LAENGE: usize = 19;

/// Bits pro AMBE-Subframe
pub const AMBE_SUBFRAME_BITS: usize = 49;

/// Bit-Offsets der drei Subframes im Fenster
pub const AMBE_SUBFRAME_OFFSETS: [usize; 3] = [0, 50, 100];

/// Laenge eines byte-aligned Subframe-Blocks
pub const AMBE_BLOCK_LAENGE: usize = 7;

/// Gesamtlaenge der extrahierten Nutzdaten (3 x 7 Bytes)
pub const AMBE_NUTZDATEN_LAENGE: usize = AMBE_BLOCK_LAENGE * AMBE_SUBFRAME_OFFSETS.len();

/// Minimale Frame-Laenge fuer einen Voice-Burst
pub const MIN_VOICE_FRAME_LAENGE: usize = AMBE_FENSTER_OFFSET + AMBE_FENSTER_LAENGE;

/// Drei byte-aligned AMBE-Bloecke
pub type AmbeNutzdaten = [u8; AMBE_NUTZDATEN_LAENGE];

/// Ein einzelner byte-aligned AMBE-Block (49 Bit + 7 Null-Bits)
pub type AmbeBlock = [u8; AMBE_BLOCK_LAENGE];

// ---------------------------------------------------------------------------
// Bitfeld-Primitive
// ---------------------------------------------------------------------------

/// Groesste Bitfeld-Laenge, die nach dem Byte-Shift noch in einen u64 passt
pub const MAX_BITFELD_LAENGE: usize = 57;

/// Prueft Laenge und Datenbereich, gibt das letzte beteiligte Byte zurueck
fn bitfeld_pruefen(daten_laenge: usize, bit_offset: usize, bit_laenge: usize) -> Result<usize> {
    if bit_laenge == 0 || bit_laenge > MAX_BITFELD_LAENGE {
        return Err(DmrlinkError::UngueltigeBitfeldLaenge(bit_laenge));
    }
    let end_byte = (bit_offset + bit_laenge - 1) / 8;
    if end_byte >= daten_laenge {
        return Err(DmrlinkError::InsufficientData {
            benoetigt: end_byte + 1,
            vorhanden: daten_laenge,
        });
    }
    Ok(end_byte)
}

/// Liest ein Bitfeld (MSB zuerst) als Integer
///
/// Unterstuetzt Felder bis 57 Bit, die beliebig ueber Bytegrenzen laufen.
///
/// # Fehler
/// - `UngueltigeBitfeldLaenge` bei Laenge 0 oder mehr als 57 Bit
/// - `InsufficientData` wenn das Feld ueber das Ende der Daten reicht
pub fn bitfeld_lesen(daten: &[u8], bit_offset: usize, bit_laenge: usize) -> Result<u64> {
    let end_byte = bitfeld_pruefen(daten.len(), bit_offset, bit_laenge)?;
    let start_byte = bit_offset / 8;
    let start_bit = bit_offset % 8;

    // Alle beteiligten Bytes zu einem Integer zusammenschieben
    let mut wert = 0u64;
    for &byte in &daten[start_byte..=end_byte] {
        wert = (wert << 8) | u64::from(byte);
    }

    let gesamt_bits = (end_byte - start_byte + 1) * 8;
    let shift = gesamt_bits - start_bit - bit_laenge;
    let maske = (1u64 << bit_laenge) - 1;

    Ok((wert >> shift) & maske)
}

/// Schreibt ein Bitfeld (MSB zuerst), umliegende Bits bleiben erhalten
///
/// Gleiche Fehler wie [`bitfeld_lesen`].
pub fn bitfeld_schreiben(
    daten: &mut [u8],
    bit_offset: usize,
    bit_laenge: usize,
    wert: u64,
) -> Result<()> {
    bitfeld_pruefen(daten.len(), bit_offset, bit_laenge)?;
    bits_eintragen(daten, bit_offset, bit_laenge, wert);
    Ok(())
}

/// Bitweises Schreiben ohne Pruefung, Aufrufer garantiert den Bereich
fn bits_eintragen(daten: &mut [u8], bit_offset: usize, bit_laenge: usize, wert: u64) {
    for i in 0..bit_laenge {
        let bit = (wert >> (bit_laenge - 1 - i)) & 1;
        let pos = bit_offset + i;
        let maske = 0x80u8 >> (pos % 8);
        if bit == 1 {
            daten[pos / 8] |= maske;
        } else {
            daten[pos / 8] &= !maske;
        }
    }
}

// ---------------------------------------------------------------------------
// AMBE-Extraktion
// ---------------------------------------------------------------------------

/// Extrahiert die drei AMBE-Subframes aus einem kompletten Voice-Frame
///
/// # Fehler
/// - `InsufficientData` wenn der Frame vor dem Ende des Fensters endet
pub fn ambe_extrahieren(frame: &[u8]) -> Result<AmbeNutzdaten> {
    if frame.len() < MIN_VOICE_FRAME_LAENGE {
        return Err(DmrlinkError::InsufficientData {
            benoetigt: MIN_VOICE_FRAME_LAENGE,
            vorhanden: frame.len(),
        });
    }
    ambe_aus_fenster(&frame[AMBE_FENSTER_OFFSET..MIN_VOICE_FRAME_LAENGE])
}

/// Extrahiert die drei AMBE-Subframes aus dem 19-Byte-Fenster
pub fn ambe_aus_fenster(fenster: &[u8]) -> Result<AmbeNutzdaten> {
    if fenster.len() < AMBE_FENSTER_LAENGE {
        return Err(DmrlinkError::InsufficientData {
            benoetigt: AMBE_FENSTER_LAENGE,
            vorhanden: fenster.len(),
        });
    }

    let mut nutzdaten = [0u8; AMBE_NUTZDATEN_LAENGE];
    for (block, &offset) in nutzdaten
        .chunks_exact_mut(AMBE_BLOCK_LAENGE)
        .zip(AMBE_SUBFRAME_OFFSETS.iter())
    {
        let wert = bitfeld_lesen(fenster, offset, AMBE_SUBFRAME_BITS)?;
        block.copy_from_slice(&block_aus_wert(wert));
    }
    Ok(nutzdaten)
}

/// Packt drei AMBE-Bloecke zurueck in ein 19-Byte-Fenster
///
/// Gegenstueck zu [`ambe_aus_fenster`]; die Luecken-Bits bleiben Null.
pub fn ambe_einpacken(nutzdaten: &AmbeNutzdaten) -> [u8; AMBE_FENSTER_LAENGE] {
    let mut fenster = [0u8; AMBE_FENSTER_LAENGE];
    for (block, &offset) in nutzdaten
        .chunks_exact(AMBE_BLOCK_LAENGE)
        .zip(AMBE_SUBFRAME_OFFSETS.iter())
    {
        let mut bytes = [0u8; 8];
        bytes[1..].copy_from_slice(block);
        let wert = u64::from_be_bytes(bytes) >> (AMBE_BLOCK_LAENGE * 8 - AMBE_SUBFRAME_BITS);
        // Offsets und Subframe-Laenge sind Konstanten innerhalb des Fensters
        bits_eintragen(&mut fenster, offset, AMBE_SUBFRAME_BITS, wert);
    }
    fenster
}

/// 49-Bit-Wert linksbuendig in einen 7-Byte-Block
fn block_aus_wert(wert: u64) -> AmbeBlock {
    let links = wert << (AMBE_BLOCK_LAENGE * 8 - AMBE_SUBFRAME_BITS);
    let bytes = links.to_be_bytes();
    let mut block = [0u8; AMBE_BLOCK_LAENGE];
    block.copy_from_slice(&bytes[1..]);
    block
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
