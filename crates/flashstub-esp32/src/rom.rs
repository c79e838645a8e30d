//! ESP32 mask ROM routines
//!
//! Addresses come from the vendor ROM linker scripts. All flash routines
//! return `esp_rom_spiflash_result_t` (0 = OK, 1 = error, 2 = timeout) and
//! expect word-aligned buffers.

extern "C" {
    pub fn esp_rom_spiflash_unlock() -> i32;
    pub fn esp_rom_spiflash_erase_sector(sector_num: u32) -> i32;
    pub fn esp_rom_spiflash_erase_area(start_addr: u32, area_len: u32) -> i32;
    pub fn esp_rom_spiflash_write(dest_addr: u32, src: *const u32, len: i32) -> i32;
    pub fn esp_rom_spiflash_read(src_addr: u32, dest: *mut u32, len: i32) -> i32;

    pub fn uartAttach();
    pub fn ets_install_uart_printf();
    pub fn ets_printf(fmt: *const u8, ...) -> i32;
}
