//! Extension function id allocation.

use std::collections::HashSet;

use crate::image::BytecodeImage;

/// Issues collision-free ids for new extension functions.
///
/// The image is rescanned on every call, so ids declared by earlier patches
/// are always seen. The cursor never moves backwards: an id handed out once is
/// not reissued during the same run, even if its function is removed again.
#[derive(Debug, Default)]
pub struct ExtensionIdAllocator {
    cursor: u32,
}

impl ExtensionIdAllocator {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Smallest id at or after the cursor that no extension function uses.
    pub fn next_id(&mut self, image: &BytecodeImage) -> u32 {
        let taken: HashSet<u32> = image.extension_functions().map(|f| f.id).collect();
        while taken.contains(&self.cursor) {
            self.cursor += 1;
        }
        let id = self.cursor;
        self.cursor += 1;
        id
    }
}
