pub(super) mod button;
pub(super) mod light;
pub(super) mod spi_flash;
