use clap::{arg, value_parser, Command};

pub const HEAT_CMD: &str = "heat";

pub fn create_heat_cli() -> Command {
    Command::new(HEAT_CMD)
        .about("Tally piRNA expression differences by genomic bin and read length")
        .arg_required_else_help(true)
        .arg(arg!(<POOL_A> "BAM file of the first pool"))
        .arg(arg!(<POOL_B> "BAM file of the second pool"))
        .arg(arg!(-o --out <name> "base name for the output file").required(true))
        .arg(arg!(--annot <gff> "annotation file to filter alignments against"))
        .arg(arg!(--class <classes> "comma separated set of annotation classes to analyse"))
        .arg(
            arg!(--bin <length> "bin length")
                .default_value("10000000")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(--min <length> "minimum length read considered")
                .default_value("20")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--max <length> "maximum length read considered")
                .default_value("35")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--minid <percent> "minimum percentage identity for mapped bases")
                .default_value("90")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(--minq <quality> "minimum per-base sequence quality")
                .default_value("20")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            arg!(--minavq <quality> "minimum average per-base sequence quality")
                .default_value("30")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--mapq <quality> "minimum mapping quality, in [0, 254]")
                .default_value("0")
                .value_parser(value_parser!(u8)),
        )
        .arg(arg!(-f --filter <class> "piwi type filter: all, primary or secondary").default_value("all"))
        .arg(arg!(--strict "reject reads that also carry the complementary signature"))
        .arg(arg!(--denest "only consider denested reads for the support count"))
        .arg(arg!(--"ignore-clip-quality" "exclude soft-clipped base qualities from the quality sum"))
        .arg(arg!(--compact "write compact JSON instead of indented"))
}
