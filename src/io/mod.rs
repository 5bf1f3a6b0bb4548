//! Reader contract and ancillary text tables

pub mod ancillary;
pub mod reader;

pub use ancillary::{
    parse_channel_table, parse_vertical_bins, read_channel_table, read_vertical_bins,
    read_vertical_bins_or_default, ChannelTable, ChannelTableRow,
};
pub use reader::{dimensions_of, DimensionReader, ExclusiveReader, MemoryReader, SerializedReader};
