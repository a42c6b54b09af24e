/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::io::Read;

use crate::{ControlError, ControlResult};

/// Extracts the genicam XML from a ZIP archive; the archive must contain
/// exactly one file.
pub(crate) fn unzip_genxml(zip: Vec<u8>) -> ControlResult<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip))
        .map_err(|e| ControlError::InvalidData(e.into()))?;
    if archive.len() != 1 {
        return Err(ControlError::InvalidData(anyhow::Error::msg(
            "zipped genicam file must contain exactly one file",
        )));
    }

    let mut file = archive
        .by_index(0)
        .map_err(|e| ControlError::InvalidData(e.into()))?;
    let mut xml = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut xml)
        .map_err(|e| ControlError::Io(e.into()))?;
    Ok(xml)
}
