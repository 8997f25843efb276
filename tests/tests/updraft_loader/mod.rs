mod remote_load;
